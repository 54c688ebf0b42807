//! Provider descriptors.
//!
//! A [`Provider`] is a declarative instruction for the [`Injector`](crate::Injector):
//!
//! - [`Provider::of`] binds a constructible type as a singleton keyed by itself
//! - [`Provider::value`] binds a constant under any key
//! - [`Provider::class`] binds a constructible type as a singleton under any key
//! - [`Provider::group`] nests providers; groups are flattened when bound
//!
//! The shape is decided when the descriptor is built. The only thing left to
//! check at bind time is that the key and the payload agree, see
//! [`Injector::provide`](crate::Injector::provide).

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::ResolutionError;
use crate::injector::Resolver;
use crate::key::ProviderKey;

/// Type-erased shared instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor.
pub type Constructor =
    Arc<dyn Fn(&Resolver<'_>) -> Result<Instance, ResolutionError> + Send + Sync>;

/// A type the container can construct.
///
/// Constructor dependencies are pulled from the [`Resolver`], which reports
/// unresolvable dependencies by key and detects cycles.
///
/// ```ignore
/// struct Blog {
///     db: Arc<Database>,
/// }
///
/// impl Injectable for Blog {
///     fn construct(resolver: &Resolver<'_>) -> Result<Self, ResolutionError> {
///         Ok(Self { db: resolver.resolve::<Database>()? })
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Builds the instance.
    fn construct(resolver: &Resolver<'_>) -> Result<Self, ResolutionError>;
}

/// Which of the three descriptor shapes a provider has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Constructible type keyed by itself.
    Type,
    /// Constant value.
    Value,
    /// Constructible type under an arbitrary key.
    Class,
}

/// A binding instruction.
#[derive(Clone)]
pub enum Provider {
    /// Constructible type bound under its own type key.
    Type {
        key: ProviderKey,
        construct: Constructor,
    },

    /// Constant value.
    Value {
        key: ProviderKey,
        value: Instance,
        value_type: TypeId,
        value_type_name: &'static str,
    },

    /// Constructible type bound under another key.
    Class {
        key: ProviderKey,
        construct: Constructor,
        implementing_type: TypeId,
        implementing_type_name: &'static str,
    },

    /// Nested providers.
    Group(Vec<Provider>),
}

impl Provider {
    /// Binds `T` as a singleton under `ProviderKey::of::<T>()`.
    #[must_use]
    pub fn of<T: Injectable>() -> Self {
        Self::Type {
            key: ProviderKey::of::<T>(),
            construct: constructor::<T>(),
        }
    }

    /// Binds a constant.
    #[must_use]
    pub fn value<T: Any + Send + Sync>(key: impl Into<ProviderKey>, value: T) -> Self {
        Self::shared_value(key, Arc::new(value))
    }

    /// Binds an already shared constant.
    #[must_use]
    pub fn shared_value<T: Any + Send + Sync>(key: impl Into<ProviderKey>, value: Arc<T>) -> Self {
        Self::Value {
            key: key.into(),
            value,
            value_type: TypeId::of::<T>(),
            value_type_name: std::any::type_name::<T>(),
        }
    }

    /// Binds `T` as a singleton under `key`.
    #[must_use]
    pub fn class<T: Injectable>(key: impl Into<ProviderKey>) -> Self {
        Self::Class {
            key: key.into(),
            construct: constructor::<T>(),
            implementing_type: TypeId::of::<T>(),
            implementing_type_name: std::any::type_name::<T>(),
        }
    }

    /// Groups providers so they can be passed around as one.
    #[must_use]
    pub fn group(providers: impl IntoIterator<Item = Provider>) -> Self {
        Self::Group(providers.into_iter().collect())
    }

    /// Returns the key, or `None` for a group.
    #[must_use]
    pub fn key(&self) -> Option<&ProviderKey> {
        match self {
            Self::Type { key, .. } | Self::Value { key, .. } | Self::Class { key, .. } => Some(key),
            Self::Group(_) => None,
        }
    }

    /// Returns the descriptor shape, or `None` for a group.
    #[must_use]
    pub fn kind(&self) -> Option<ProviderKind> {
        match self {
            Self::Type { .. } => Some(ProviderKind::Type),
            Self::Value { .. } => Some(ProviderKind::Value),
            Self::Class { .. } => Some(ProviderKind::Class),
            Self::Group(_) => None,
        }
    }

    /// Visits every non-group provider, depth first.
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a Provider)) {
        match self {
            Self::Group(providers) => {
                for provider in providers {
                    provider.for_each_leaf(f);
                }
            }
            leaf => f(leaf),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { key, .. } => f.debug_struct("Type").field("key", key).finish(),
            Self::Value {
                key,
                value_type_name,
                ..
            } => f
                .debug_struct("Value")
                .field("key", key)
                .field("value_type", value_type_name)
                .finish(),
            Self::Class {
                key,
                implementing_type_name,
                ..
            } => f
                .debug_struct("Class")
                .field("key", key)
                .field("implementing_type", implementing_type_name)
                .finish(),
            Self::Group(providers) => f.debug_tuple("Group").field(providers).finish(),
        }
    }
}

impl From<Vec<Provider>> for Provider {
    fn from(providers: Vec<Provider>) -> Self {
        Self::Group(providers)
    }
}

fn constructor<T: Injectable>() -> Constructor {
    Arc::new(|resolver: &Resolver<'_>| {
        let instance: Instance = Arc::new(T::construct(resolver)?);
        Ok(instance)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;

    impl Injectable for Clock {
        fn construct(_resolver: &Resolver<'_>) -> Result<Self, ResolutionError> {
            Ok(Clock)
        }
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Provider::of::<Clock>().kind(), Some(ProviderKind::Type));
        assert_eq!(
            Provider::value("answer", 42u32).kind(),
            Some(ProviderKind::Value)
        );
        assert_eq!(
            Provider::class::<Clock>("clock").kind(),
            Some(ProviderKind::Class)
        );
        assert_eq!(Provider::group(vec![]).kind(), None);
    }

    #[test]
    fn test_for_each_leaf_flattens_nested_groups() {
        let provider = Provider::group(vec![
            Provider::value("a", 1u8),
            Provider::group(vec![Provider::value("b", 2u8), Provider::of::<Clock>()]),
        ]);

        let mut keys = Vec::new();
        provider.for_each_leaf(&mut |p| keys.push(p.key().cloned()));

        assert_eq!(
            keys,
            vec![
                Some(ProviderKey::token("a")),
                Some(ProviderKey::token("b")),
                Some(ProviderKey::of::<Clock>()),
            ]
        );
    }
}
