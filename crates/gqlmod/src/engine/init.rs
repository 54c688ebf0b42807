//! Engine initialization.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use gqlmod_di::{Provider, ProviderKey};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error, info};

use super::{CompositionEngine, EngineState};
use crate::bridge::SharedBridge;
use crate::context::ContextAccessor;
use crate::error::{ComposeError, HookError};
use crate::implementation::{ImplementationParams, Implementations};
use crate::module::ModuleImplementation;
use crate::schema::{ResolverMap, SchemaDocument};

type ParamsFactory = Box<dyn FnOnce() -> Result<Value, HookError> + Send>;

/// Parameters passed to `init`.
///
/// Plain JSON, or a sync or async factory producing it. The result is
/// handed to every `on_init` hook and to deferred type definitions and
/// resolvers.
#[derive(Default)]
pub enum InitParams {
    #[default]
    None,
    Value(Value),
    Factory(ParamsFactory),
    Future(BoxFuture<'static, Result<Value, HookError>>),
}

impl InitParams {
    pub fn factory<F>(factory: F) -> Self
    where
        F: FnOnce() -> Result<Value, HookError> + Send + 'static,
    {
        Self::Factory(Box::new(factory))
    }

    pub fn future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<Value, HookError>> + Send + 'static,
    {
        Self::Future(future.boxed())
    }

    async fn resolve(self) -> Result<Value, HookError> {
        match self {
            Self::None => Ok(Value::Null),
            Self::Value(value) => Ok(value),
            Self::Factory(factory) => factory(),
            Self::Future(future) => future.await,
        }
    }
}

impl From<Value> for InitParams {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Option<Value>> for InitParams {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::None, Self::Value)
    }
}

impl fmt::Debug for InitParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::Future(_) => f.write_str("Future(..)"),
        }
    }
}

impl CompositionEngine {
    /// Initializes the engine. May be called once.
    ///
    /// Runs every `on_init` hook in declaration order, binds providers,
    /// merges schema and resolvers, then builds implementations in
    /// dependency order. On failure the engine moves to
    /// [`EngineState::Failed`] and keeps no partial init result.
    ///
    /// # Errors
    ///
    /// [`ComposeError::InvalidState`] if the engine was already initialized;
    /// otherwise the first failing step's error.
    pub async fn init(&mut self, params: impl Into<InitParams>) -> Result<(), ComposeError> {
        self.expect_state(EngineState::Constructed)?;
        self.state = EngineState::Initializing;
        info!(modules = self.modules.len(), "Initializing composition engine");

        match self.run_init(params.into()).await {
            Ok(()) => {
                self.state = EngineState::Ready;
                info!(
                    types = self.type_defs.types().count(),
                    resolvers = self.resolvers.len(),
                    implementations = self.implementations.len(),
                    "Composition engine ready"
                );
                Ok(())
            }
            Err(e) => {
                self.state = EngineState::Failed;
                error!(error = %e, "Composition engine initialization failed");
                Err(e)
            }
        }
    }

    async fn run_init(&mut self, params: InitParams) -> Result<(), ComposeError> {
        let params = Arc::new(params.resolve().await.map_err(ComposeError::InitParams)?);
        self.init_params = Arc::clone(&params);

        self.init_result = self.run_on_init(&params).await?;

        for provider in &self.providers {
            self.injector.provide(provider)?;
        }
        if let Some(bridge) = &self.bridge {
            self.injector
                .provide(&Provider::value(ProviderKey::of::<SharedBridge>(), Arc::clone(bridge)))?;
        }

        self.merge_schema()?;

        self.module_order = self.order();
        self.implementations = Arc::new(self.build_implementations(&self.module_order).await?);

        for provider in &self.providers {
            self.injector.init(provider)?;
        }
        for name in &self.module_order {
            if let Some(module) = self.module(name) {
                for provider in module.providers() {
                    self.injector.init(provider)?;
                }
            }
        }

        Ok(())
    }

    /// Runs `on_init` hooks in declaration order and settles deferred type
    /// definitions and resolvers with each module's own result.
    async fn run_on_init(
        &mut self,
        params: &Arc<Value>,
    ) -> Result<IndexMap<String, Value>, ComposeError> {
        let mut init_result = IndexMap::new();

        for module in &mut self.modules {
            let contribution = match module.on_init().cloned() {
                Some(on_init) => {
                    debug!(module = %module.name(), "Running on_init");
                    on_init(Arc::clone(params), module.config().clone())
                        .await
                        .map_err(|source| {
                            error!(
                                module = %module.name(),
                                error = %source,
                                "Unable to initialize module"
                            );
                            ComposeError::Initialization {
                                module: module.name().to_string(),
                                source,
                            }
                        })?
                }
                None => Value::Null,
            };

            module.resolve_deferred(params, &contribution);

            // Only objects and arrays are kept as contributions
            if contribution.is_object() || contribution.is_array() {
                init_result.insert(module.name().to_string(), contribution);
            }
        }

        Ok(init_result)
    }

    /// Merges module type definitions and resolvers, then the non-module
    /// ones, and applies the resolvers composition.
    fn merge_schema(&mut self) -> Result<(), ComposeError> {
        let fragments = self
            .modules
            .iter()
            .filter_map(|module| module.type_defs())
            .chain(std::iter::once(&self.non_modules.type_defs))
            .flat_map(|type_defs| type_defs.fragments());
        self.type_defs = SchemaDocument::merge(fragments)?;

        let merged = ResolverMap::merge_all(
            self.modules
                .iter()
                .filter_map(|module| module.resolvers())
                .chain(std::iter::once(&self.non_modules.resolvers)),
        );
        self.resolvers = match &self.composition {
            Some(composition) => composition.apply(merged),
            None => merged,
        };

        debug!(
            types = self.type_defs.types().count(),
            resolvers = self.resolvers.len(),
            "Merged schema"
        );
        Ok(())
    }

    /// Binds each module's config and providers and builds its
    /// implementation, in dependency order.
    async fn build_implementations(
        &self,
        order: &[String],
    ) -> Result<Implementations, ComposeError> {
        let mut implementations = Implementations::new();

        for name in order {
            let Some(module) = self.module(name) else {
                continue;
            };

            let config_key = ProviderKey::module_config(name.as_str());
            self.injector
                .provide(&Provider::value(config_key, module.config().clone()))?;
            for provider in module.providers() {
                self.injector.provide(provider)?;
            }

            let built = match module.implementation() {
                Some(ModuleImplementation::Value(implementation)) => Arc::clone(implementation),
                Some(ModuleImplementation::Factory(factory)) => {
                    debug!(module = %name, "Building implementation");
                    let params = ImplementationParams {
                        implementations: implementations.clone(),
                        config: module.config().clone(),
                        bridge: self.bridge.clone(),
                        context: ContextAccessor,
                    };
                    factory(params).await.map_err(|source| {
                        error!(module = %name, error = %source, "Unable to build implementation");
                        ComposeError::Implementation {
                            module: name.clone(),
                            source,
                        }
                    })?
                }
                None => continue,
            };
            implementations.insert(name.clone(), built);
        }

        Ok(implementations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use serde_json::json;

    #[tokio::test]
    async fn test_init_params_factory_and_future() {
        let value = InitParams::factory(|| Ok(json!({ "env": "test" }))).resolve().await.unwrap();
        assert_eq!(value["env"], "test");

        let value = InitParams::future(async { Ok(json!(1)) }).resolve().await.unwrap();
        assert_eq!(value, json!(1));

        assert_eq!(InitParams::default().resolve().await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_failing_params_factory_fails_init() {
        let mut engine = CompositionEngine::new([Module::new("a")]).unwrap();
        let err = engine
            .init(InitParams::factory(|| Err(HookError::execution("no env"))))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "INIT_PARAMS_FAILED");
        assert_eq!(engine.state(), EngineState::Failed);
    }

    #[tokio::test]
    async fn test_second_init_is_rejected() {
        let mut engine = CompositionEngine::new([Module::new("a")]).unwrap();
        engine.init(InitParams::None).await.unwrap();

        let err = engine.init(json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            ComposeError::InvalidState {
                expected: EngineState::Constructed,
                actual: EngineState::Ready
            }
        ));
    }

    #[tokio::test]
    async fn test_scalar_init_results_are_not_recorded() {
        let mut engine = CompositionEngine::new([
            Module::new("flag").with_on_init(|_, _| async { Ok(json!(true)) }),
            Module::new("list").with_on_init(|_, _| async { Ok(json!([1, 2])) }),
        ])
        .unwrap();
        engine.init(InitParams::None).await.unwrap();

        assert!(!engine.init_result().contains_key("flag"));
        assert_eq!(engine.init_result()["list"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_deferred_type_defs_see_own_init_result() {
        let mut engine = CompositionEngine::new([Module::new("stats")
            .with_on_init(|_, _| async { Ok(json!({ "field": "hits" })) })
            .with_type_defs_fn(|params: &Value, init: &Value| {
                format!(
                    "type Query {{ {}: Int {}: String }}",
                    init["field"].as_str().unwrap_or("none"),
                    params["env"].as_str().unwrap_or("none")
                )
            })])
        .unwrap();
        engine.init(json!({ "env": "test" })).await.unwrap();

        let sdl = engine.type_defs().to_sdl();
        assert!(sdl.contains("hits: Int"));
        assert!(sdl.contains("test: String"));
        assert!(!engine.module("stats").unwrap().is_deferred());
    }
}
