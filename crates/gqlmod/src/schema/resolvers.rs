//! Field resolvers and the resolver map.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::context::Context;

/// Result of a field resolver.
pub type ResolverResult = Result<Value, async_graphql::Error>;

type ResolverFn = dyn Fn(ResolveParams) -> BoxFuture<'static, ResolverResult> + Send + Sync;

/// Where a field is being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub parent_type: String,
    pub field: String,
}

/// Everything a resolver gets for one field.
#[derive(Debug, Clone)]
pub struct ResolveParams {
    /// The parent object, `Null` for root fields.
    pub parent: Value,
    /// Field arguments, defaults applied.
    pub args: Map<String, Value>,
    /// The request context.
    pub context: Arc<Context>,
    pub info: FieldInfo,
}

impl ResolveParams {
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Deserializes one argument. A missing argument deserializes from
    /// `null`, so `Option<T>` targets accept it.
    ///
    /// # Errors
    ///
    /// Returns an error naming the argument if it does not fit `T`.
    pub fn arg_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, async_graphql::Error> {
        let value = self.args.get(name).unwrap_or(&Value::Null);
        T::deserialize(value)
            .map_err(|err| async_graphql::Error::new(format!("Invalid argument \"{name}\": {err}")))
    }
}

/// A field resolver. Cheap to clone.
#[derive(Clone)]
pub struct Resolver(Arc<ResolverFn>);

impl Resolver {
    /// Wraps an async resolver function.
    pub fn new<F, Fut>(resolve: F) -> Self
    where
        F: Fn(ResolveParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self(Arc::new(move |params| resolve(params).boxed()))
    }

    /// Wraps a synchronous resolver function.
    pub fn from_fn<F>(resolve: F) -> Self
    where
        F: Fn(ResolveParams) -> ResolverResult + Send + Sync + 'static,
    {
        Self(Arc::new(move |params| {
            let result = resolve(params);
            async move { result }.boxed()
        }))
    }

    /// Always resolves to `value`.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::from_fn(move |_| Ok(value.clone()))
    }

    /// Runs the resolver.
    pub fn call(&self, params: ResolveParams) -> BoxFuture<'static, ResolverResult> {
        (self.0)(params)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resolver(..)")
    }
}

/// Resolvers keyed by type then field name.
#[derive(Debug, Clone, Default)]
pub struct ResolverMap {
    types: IndexMap<String, IndexMap<String, Resolver>>,
}

impl ResolverMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resolver, replacing any previous one for the same field.
    #[must_use]
    pub fn field(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        resolver: Resolver,
    ) -> Self {
        self.insert(type_name, field, resolver);
        self
    }

    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        resolver: Resolver,
    ) {
        self.types
            .entry(type_name.into())
            .or_default()
            .insert(field.into(), resolver);
    }

    #[must_use]
    pub fn get(&self, type_name: &str, field: &str) -> Option<&Resolver> {
        self.types.get(type_name).and_then(|fields| fields.get(field))
    }

    pub(crate) fn get_mut(&mut self, type_name: &str, field: &str) -> Option<&mut Resolver> {
        self.types.get_mut(type_name).and_then(|fields| fields.get_mut(field))
    }

    /// Field names with a resolver on `type_name`.
    #[must_use]
    pub fn fields(&self, type_name: &str) -> Vec<String> {
        self.types
            .get(type_name)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Every resolved field as `Type.field`.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.types
            .iter()
            .flat_map(|(type_name, fields)| {
                fields.keys().map(move |field| format!("{type_name}.{field}"))
            })
            .collect()
    }

    /// Copies every resolver of `other` into this map. On a clash the
    /// resolver from `other` wins.
    pub fn merge(&mut self, other: &ResolverMap) {
        for (type_name, fields) in &other.types {
            let target = self.types.entry(type_name.clone()).or_default();
            for (field, resolver) in fields {
                target.insert(field.clone(), resolver.clone());
            }
        }
    }

    /// Merges maps in order, later maps winning.
    pub fn merge_all<'a>(maps: impl IntoIterator<Item = &'a ResolverMap>) -> Self {
        let mut merged = Self::new();
        for map in maps {
            merged.merge(map);
        }
        merged
    }

    /// Number of resolved fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.values().map(IndexMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlmod_di::Injector;
    use serde_json::json;

    fn params() -> ResolveParams {
        ResolveParams {
            parent: Value::Null,
            args: Map::new(),
            context: Arc::new(Context::new(
                IndexMap::new(),
                Arc::new(json!({})),
                Injector::new(),
                Vec::new(),
            )),
            info: FieldInfo {
                parent_type: "Query".into(),
                field: "test".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_merge_is_last_write_wins() {
        let first = ResolverMap::new()
            .field("Query", "a", Resolver::constant(1))
            .field("Query", "b", Resolver::constant("first"));
        let second = ResolverMap::new().field("Query", "b", Resolver::constant("second"));

        let merged = ResolverMap::merge_all([&first, &second]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.paths(), vec!["Query.a", "Query.b"]);
        let b = merged.get("Query", "b").unwrap().call(params()).await.unwrap();
        assert_eq!(b, json!("second"));
    }

    #[test]
    fn test_merging_empty_map_changes_nothing() {
        let map = ResolverMap::new().field("Query", "a", Resolver::constant(1));
        let merged = ResolverMap::merge_all([&map, &ResolverMap::new()]);
        assert_eq!(merged.paths(), map.paths());
    }

    #[tokio::test]
    async fn test_async_resolver_reads_args() {
        let resolver = Resolver::new(|params: ResolveParams| async move {
            let name: String = params.arg_as("name")?;
            Ok(json!(format!("hello {name}")))
        });

        let mut params = params();
        params.args.insert("name".into(), json!("ada"));
        assert_eq!(resolver.call(params).await.unwrap(), json!("hello ada"));
    }

    #[test]
    fn test_arg_as_reports_argument() {
        let err = params().arg_as::<String>("missing").err().unwrap();
        assert!(err.message.contains("\"missing\""));
        assert_eq!(params().arg_as::<Option<String>>("missing").unwrap(), None);
    }
}
