//! Per-request context assembly and execution.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::{CompositionEngine, EngineState};
use crate::context::{Context, ContextEntry, NetworkRequest};
use crate::error::ComposeError;

impl CompositionEngine {
    /// Builds the context for one request.
    ///
    /// Root entries are the module implementations. Init results and then
    /// context builder patches, run in dependency order, are layered on top;
    /// a later builder overwrites an earlier one's keys. Keys that clash with
    /// an implementation are dropped and listed in [`Context::collisions`].
    ///
    /// # Errors
    ///
    /// [`ComposeError::InvalidState`] if the engine is not ready,
    /// [`ComposeError::ContextBuild`] if a context builder fails.
    pub async fn build_context(
        &self,
        request: NetworkRequest,
    ) -> Result<Arc<Context>, ComposeError> {
        self.expect_state(EngineState::Ready)?;

        let init_params = if self.init_params.is_null() {
            Arc::new(Value::Object(Map::new()))
        } else {
            Arc::clone(&self.init_params)
        };

        let mut entries: IndexMap<String, ContextEntry> = self
            .implementations
            .iter()
            .map(|(name, implementation)| {
                (name.to_string(), ContextEntry::Shared(Arc::clone(implementation)))
            })
            .collect();

        // Builders see the implementations only, never each other's output
        let snapshot = Arc::new(Context::new(
            entries.clone(),
            Arc::clone(&init_params),
            self.injector.clone(),
            Vec::new(),
        ));

        let mut contributed: IndexMap<String, ContextEntry> = self
            .init_result
            .iter()
            .map(|(name, value)| (name.clone(), ContextEntry::Value(value.clone())))
            .collect();

        for name in &self.module_order {
            let Some(builder) = self.module(name).and_then(|module| module.context_builder()) else {
                continue;
            };
            let implementations = Arc::clone(&self.implementations);
            let patch = builder(request.clone(), implementations, Arc::clone(&snapshot))
                .await
                .map_err(|source| {
                    error!(module = %name, error = %source, "Unable to build context");
                    ComposeError::ContextBuild {
                        module: name.clone(),
                        source,
                    }
                })?;
            debug!(module = %name, keys = patch.len(), "Context builder finished");
            for (key, entry) in patch {
                contributed.insert(key, entry);
            }
        }

        let mut collisions = Vec::new();
        for (key, entry) in contributed {
            if entries.contains_key(&key) {
                warn!(
                    key = %key,
                    "Context key clashes with a module implementation and is ignored"
                );
                collisions.push(key);
            } else {
                entries.insert(key, entry);
            }
        }

        Ok(Arc::new(Context::new(
            entries,
            init_params,
            self.injector.clone(),
            collisions,
        )))
    }

    /// Builds a context for `network_request` and executes `request` with it.
    ///
    /// The context is attached as request data (`Arc<Context>`) and bound as
    /// the current context while the request runs.
    ///
    /// # Errors
    ///
    /// Fails if the schema cannot be built or the context cannot be
    /// assembled. GraphQL errors are reported in the response.
    pub async fn execute(
        &self,
        request: impl Into<async_graphql::Request>,
        network_request: NetworkRequest,
    ) -> Result<async_graphql::Response, ComposeError> {
        let schema = self.schema()?;
        let context = self.build_context(network_request).await?;
        let request = request.into().data(Arc::clone(&context));
        Ok(context.scope(schema.execute(request)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextPatch;
    use crate::error::HookError;
    use crate::module::Module;
    use serde_json::json;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn take(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.lock().unwrap())).unwrap()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_build_context_requires_ready_engine() {
        let engine = CompositionEngine::new([Module::new("a")]).unwrap();
        let err = engine.build_context(NetworkRequest::none()).await.unwrap_err();
        assert!(!err.is_request_scoped());
        assert_eq!(err.error_code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_failing_builder_is_request_scoped() {
        let mut engine = CompositionEngine::new([
            Module::new("auth").with_context_builder(|request: NetworkRequest, _, _| async move {
                match request.downcast_ref::<String>() {
                    Some(token) => Ok(ContextPatch::new().value("token", token.clone())),
                    None => Err(HookError::execution("missing token")),
                }
            }),
        ])
        .unwrap();
        engine.init(json!({})).await.unwrap();

        let err = engine.build_context(NetworkRequest::none()).await.unwrap_err();
        assert!(err.is_request_scoped());
        assert_eq!(err.module(), Some("auth"));

        let context = engine
            .build_context(NetworkRequest::new(String::from("abc")))
            .await
            .unwrap();
        assert_eq!(context.value("token"), Some(&json!("abc")));
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn test_init_params_default_to_empty_object() {
        let mut engine = CompositionEngine::new([Module::new("a")]).unwrap();
        engine.init(crate::engine::InitParams::None).await.unwrap();

        let context = engine.build_context(NetworkRequest::none()).await.unwrap();
        assert_eq!(context.init_params(), &json!({}));
        assert!(context.is_empty());
    }

    #[test]
    fn test_cycles_are_logged_during_init_only() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut engine = CompositionEngine::new([
                Module::new("a").with_dependency("b").with_context_builder(|_, _, _| async {
                    Ok(ContextPatch::new().value("seen", true))
                }),
                Module::new("b").with_dependency("a"),
            ])
            .unwrap();
            tokio_test::block_on(engine.init(json!({}))).unwrap();
            assert!(logs.take().contains("Circular module dependency"));

            for _ in 0..2 {
                let context =
                    tokio_test::block_on(engine.build_context(NetworkRequest::none())).unwrap();
                assert_eq!(context.value("seen"), Some(&json!(true)));
            }
            assert!(!logs.take().contains("Circular module dependency"));
        });
    }
}
