//! Module implementations.
//!
//! An implementation is a module's runtime object (a service, a repository,
//! a client). It is built once during init, in dependency order, and shared
//! with every request afterwards.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::bridge::SharedBridge;
use crate::context::ContextAccessor;

/// A type-erased implementation.
pub type Implementation = Arc<dyn Any + Send + Sync>;

/// Implementations keyed by module name, in build order.
#[derive(Clone, Default)]
pub struct Implementations {
    entries: IndexMap<String, Implementation>,
}

impl Implementations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the implementation of `module` if it is a `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, module: &str) -> Option<Arc<T>> {
        self.entries
            .get(module)
            .and_then(|implementation| Arc::clone(implementation).downcast::<T>().ok())
    }

    /// Returns the type-erased implementation of `module`.
    #[must_use]
    pub fn get_raw(&self, module: &str) -> Option<&Implementation> {
        self.entries.get(module)
    }

    /// Returns whether `module` has an implementation of type `T`.
    #[must_use]
    pub fn is<T: Any>(&self, module: &str) -> bool {
        self.entries
            .get(module)
            .is_some_and(|implementation| (**implementation).type_id() == TypeId::of::<T>())
    }

    #[must_use]
    pub fn contains(&self, module: &str) -> bool {
        self.entries.contains_key(module)
    }

    /// Module names, in build order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Implementation)> {
        self.entries.iter().map(|(name, implementation)| (name.as_str(), implementation))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, module: impl Into<String>, implementation: Implementation) {
        self.entries.insert(module.into(), implementation);
    }
}

impl fmt::Debug for Implementations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// Arguments handed to an implementation factory.
#[derive(Clone)]
pub struct ImplementationParams {
    /// Implementations of the modules ordered before this one.
    pub implementations: Implementations,

    /// The module's attached configuration, `Null` if none.
    pub config: Value,

    /// The engine's communication bridge, if one was supplied.
    pub bridge: Option<SharedBridge>,

    /// Reads the context of the request currently being served.
    pub context: ContextAccessor,
}

impl ImplementationParams {
    /// Deserializes the module configuration.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error if the configuration does not have
    /// the shape of `T`.
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.config)
    }
}

impl fmt::Debug for ImplementationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationParams")
            .field("implementations", &self.implementations)
            .field("config", &self.config)
            .field("bridge", &self.bridge.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserService {
        prefix: &'static str,
    }

    #[test]
    fn test_typed_lookup() {
        let mut implementations = Implementations::new();
        implementations.insert("users", Arc::new(UserService { prefix: "user:" }));

        let service = implementations.get::<UserService>("users").unwrap();
        assert_eq!(service.prefix, "user:");
        assert!(implementations.is::<UserService>("users"));
        assert!(implementations.get::<String>("users").is_none());
        assert!(implementations.get::<UserService>("posts").is_none());
    }

    #[test]
    fn test_names_keep_build_order() {
        let mut implementations = Implementations::new();
        implementations.insert("b", Arc::new(1u8));
        implementations.insert("a", Arc::new(2u8));
        assert_eq!(implementations.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
