//! The singleton container.
//!
//! [`Injector`] holds one binding per [`ProviderKey`]. Constants are returned
//! as bound; types and classes are constructed on first resolution (or when
//! forced through [`Injector::init`]) and cached for the lifetime of the
//! binding. Re-providing a key replaces the binding, including any cached
//! instance.
//!
//! Construction holds the binding's cell until the constructor returns, and a
//! second thread resolving the same key blocks on it. Cycles are detected
//! along one resolution chain only: if two threads each start at a different
//! member of the same cycle, both block and never return. Resolve cyclic
//! graphs from a single thread, or break the cycle with a constant.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::error::{ProviderError, ResolutionError};
use crate::key::ProviderKey;
use crate::provider::{Constructor, Instance, Provider, ProviderKind};

/// A bound entry.
struct Binding {
    kind: ProviderKind,
    source: Source,
    instance: OnceCell<Instance>,
}

enum Source {
    Constant(Instance),
    Singleton(Constructor),
}

/// Thread-safe singleton container.
///
/// Cloning is cheap and every clone shares the same bindings.
#[derive(Clone, Default)]
pub struct Injector {
    bindings: Arc<DashMap<ProviderKey, Arc<Binding>>>,
}

impl Injector {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider. Groups are flattened recursively.
    ///
    /// Re-registering a key overwrites the previous binding.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Malformed`] if the key does not match the
    /// payload (for example a type key over a value of another type) or if a
    /// string key is empty. Leaves before the malformed one stay bound.
    pub fn provide(&self, provider: &Provider) -> Result<(), ProviderError> {
        let mut result = Ok(());
        provider.for_each_leaf(&mut |leaf| {
            if result.is_ok() {
                result = self.provide_leaf(leaf);
            }
        });
        result
    }

    fn provide_leaf(&self, provider: &Provider) -> Result<(), ProviderError> {
        let (key, binding) = match provider {
            Provider::Type { key, construct } => {
                check_key(key)?;
                (key, Binding::singleton(ProviderKind::Type, construct.clone()))
            }
            Provider::Value {
                key,
                value,
                value_type,
                value_type_name,
            } => {
                check_key(key)?;
                if let Some(id) = key.type_id()
                    && id != *value_type
                {
                    return Err(ProviderError::malformed(
                        key,
                        format!(
                            "value of type {value_type_name} cannot be bound under a key for \
                             another type"
                        ),
                    ));
                }
                (key, Binding::constant(value.clone()))
            }
            Provider::Class {
                key,
                construct,
                implementing_type,
                implementing_type_name,
            } => {
                check_key(key)?;
                if let Some(id) = key.type_id()
                    && id != *implementing_type
                {
                    return Err(ProviderError::malformed(
                        key,
                        format!(
                            "class {implementing_type_name} cannot be bound under a key for \
                             another type"
                        ),
                    ));
                }
                (key, Binding::singleton(ProviderKind::Class, construct.clone()))
            }
            Provider::Group(_) => unreachable!("groups are flattened by for_each_leaf"),
        };

        if self.bindings.insert(key.clone(), Arc::new(binding)).is_some() {
            debug!(key = %key, "Rebound provider");
        } else {
            trace!(key = %key, "Bound provider");
        }
        Ok(())
    }

    /// Forces construction of the singletons described by `provider`.
    ///
    /// Constants are left alone. Groups are flattened recursively.
    ///
    /// # Errors
    ///
    /// Returns the first resolution failure.
    pub fn init(&self, provider: &Provider) -> Result<(), ResolutionError> {
        let mut result = Ok(());
        provider.for_each_leaf(&mut |leaf| {
            if result.is_err() {
                return;
            }
            if let (Some(key), Some(ProviderKind::Type | ProviderKind::Class)) =
                (leaf.key(), leaf.kind())
            {
                result = self.resolve_in(key, &[]).map(|_| ());
            }
        });
        result
    }

    /// Resolves the binding under `key` as a `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] naming the offending key if the key is
    /// unbound, a constructor dependency cannot be resolved, resolution is
    /// circular, or the bound value is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &ProviderKey) -> Result<Arc<T>, ResolutionError> {
        downcast(key, self.resolve_in(key, &[])?)
    }

    /// Resolves the binding for the type `T` itself.
    ///
    /// # Errors
    ///
    /// See [`Injector::get`].
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ResolutionError> {
        self.get(&ProviderKey::of::<T>())
    }

    /// Resolves the binding under `key` without downcasting.
    ///
    /// # Errors
    ///
    /// See [`Injector::get`].
    pub fn get_instance(&self, key: &ProviderKey) -> Result<Instance, ResolutionError> {
        self.resolve_in(key, &[])
    }

    /// Like [`Injector::get`] but returns `None` for unbound keys.
    ///
    /// # Errors
    ///
    /// Any failure other than an unbound key.
    pub fn try_get<T: Any + Send + Sync>(
        &self,
        key: &ProviderKey,
    ) -> Result<Option<Arc<T>>, ResolutionError> {
        if !self.contains(key) {
            return Ok(None);
        }
        self.get(key).map(Some)
    }

    /// Returns whether `key` is bound.
    #[must_use]
    pub fn contains(&self, key: &ProviderKey) -> bool {
        self.bindings.contains_key(key)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Snapshot of the bound keys, in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<ProviderKey> {
        self.bindings.iter().map(|entry| entry.key().clone()).collect()
    }

    fn resolve_in(
        &self,
        key: &ProviderKey,
        path: &[ProviderKey],
    ) -> Result<Instance, ResolutionError> {
        if path.contains(key) {
            let mut cycle: Vec<String> = path.iter().map(ToString::to_string).collect();
            cycle.push(key.to_string());
            return Err(ResolutionError::Circular { path: cycle });
        }

        // Clone the binding out so no map guard is held while constructing.
        // The cell itself stays locked until `construct` returns.
        let binding = self
            .bindings
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ResolutionError::unbound(key))?;

        match &binding.source {
            Source::Constant(value) => Ok(Arc::clone(value)),
            Source::Singleton(construct) => binding
                .instance
                .get_or_try_init(|| {
                    let mut nested = path.to_vec();
                    nested.push(key.clone());
                    let resolver = Resolver {
                        injector: self,
                        path: nested,
                    };
                    trace!(key = %key, kind = ?binding.kind, "Constructing singleton");
                    construct(&resolver)
                })
                .map(Arc::clone),
        }
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl Binding {
    fn constant(value: Instance) -> Self {
        Self {
            kind: ProviderKind::Value,
            source: Source::Constant(value),
            instance: OnceCell::new(),
        }
    }

    fn singleton(kind: ProviderKind, construct: Constructor) -> Self {
        Self {
            kind,
            source: Source::Singleton(construct),
            instance: OnceCell::new(),
        }
    }
}

/// Resolution handle passed to [`Injectable::construct`](crate::Injectable::construct).
///
/// Tracks the chain of keys being constructed on this thread so that a
/// cycle along it is reported as [`ResolutionError::Circular`], and so that a
/// failing dependency is reported together with the key that needed it.
/// Chains on other threads are not visible; see the module docs.
pub struct Resolver<'a> {
    injector: &'a Injector,
    path: Vec<ProviderKey>,
}

impl<'a> Resolver<'a> {
    /// The container being resolved from.
    #[must_use]
    pub fn injector(&self) -> &'a Injector {
        self.injector
    }

    /// The key currently under construction.
    #[must_use]
    pub fn current(&self) -> Option<&ProviderKey> {
        self.path.last()
    }

    /// Resolves a dependency by key.
    ///
    /// # Errors
    ///
    /// A failing dependency is reported as [`ResolutionError::Dependency`]
    /// naming both the key under construction and the dependency.
    pub fn get<T: Any + Send + Sync>(&self, key: &ProviderKey) -> Result<Arc<T>, ResolutionError> {
        let instance = self.injector.resolve_in(key, &self.path).map_err(|err| match err {
            ResolutionError::Circular { .. } | ResolutionError::Dependency { .. } => err,
            other => ResolutionError::Dependency {
                key: self
                    .current()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                dependency: key.to_string(),
                reason: other.to_string(),
            },
        })?;
        downcast(key, instance)
    }

    /// Resolves a dependency keyed by its own type.
    ///
    /// # Errors
    ///
    /// See [`Resolver::get`].
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ResolutionError> {
        self.get(&ProviderKey::of::<T>())
    }

    /// Resolves an optional dependency; unbound keys yield `None`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::get`].
    pub fn try_get<T: Any + Send + Sync>(
        &self,
        key: &ProviderKey,
    ) -> Result<Option<Arc<T>>, ResolutionError> {
        if !self.injector.contains(key) {
            return Ok(None);
        }
        self.get(key).map(Some)
    }
}

fn check_key(key: &ProviderKey) -> Result<(), ProviderError> {
    match key {
        ProviderKey::Token(token) if token.trim().is_empty() => {
            Err(ProviderError::malformed(key, "token keys must not be empty"))
        }
        ProviderKey::ModuleConfig(module) if module.trim().is_empty() => Err(
            ProviderError::malformed(key, "module config keys need a module name"),
        ),
        _ => Ok(()),
    }
}

fn downcast<T: Any + Send + Sync>(
    key: &ProviderKey,
    instance: Instance,
) -> Result<Arc<T>, ResolutionError> {
    instance
        .downcast::<T>()
        .map_err(|_| ResolutionError::TypeMismatch {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
        })
}
