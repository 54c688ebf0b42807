//! Binding keys.
//!
//! Every binding in the [`Injector`](crate::Injector) is addressed by a
//! [`ProviderKey`]. A key is either the type of the bound value, a free-form
//! string token, or the configuration slot of a named module.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opaque identifier of a container binding.
#[derive(Clone)]
pub enum ProviderKey {
    /// Keyed by a Rust type.
    Type {
        /// Type id used for equality.
        id: TypeId,
        /// Type name, for diagnostics only.
        name: &'static str,
    },

    /// Keyed by a string token.
    Token(Cow<'static, str>),

    /// Configuration slot of a module.
    ModuleConfig(String),
}

impl ProviderKey {
    /// Key for the type `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key for a string token.
    #[must_use]
    pub fn token(token: impl Into<Cow<'static, str>>) -> Self {
        Self::Token(token.into())
    }

    /// Key under which a module's configuration is bound.
    #[must_use]
    pub fn module_config(module: impl Into<String>) -> Self {
        Self::ModuleConfig(module.into())
    }

    /// Returns the type id if this is a type key.
    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Self::Type { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Returns true for a type key of `T`.
    #[must_use]
    pub fn is_type<T: Any>(&self) -> bool {
        self.type_id() == Some(TypeId::of::<T>())
    }
}

impl PartialEq for ProviderKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Type { id: a, .. }, Self::Type { id: b, .. }) => a == b,
            (Self::Token(a), Self::Token(b)) => a == b,
            (Self::ModuleConfig(a), Self::ModuleConfig(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ProviderKey {}

impl Hash for ProviderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Type { id, .. } => id.hash(state),
            Self::Token(token) => token.hash(state),
            Self::ModuleConfig(module) => module.hash(state),
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name, .. } => write!(f, "{name}"),
            Self::Token(token) => write!(f, "{token}"),
            Self::ModuleConfig(module) => write!(f, "ModuleConfig({module})"),
        }
    }
}

impl fmt::Debug for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name, .. } => f.debug_tuple("Type").field(name).finish(),
            Self::Token(token) => f.debug_tuple("Token").field(token).finish(),
            Self::ModuleConfig(module) => f.debug_tuple("ModuleConfig").field(module).finish(),
        }
    }
}

impl From<&'static str> for ProviderKey {
    fn from(token: &'static str) -> Self {
        Self::token(token)
    }
}

impl From<String> for ProviderKey {
    fn from(token: String) -> Self {
        Self::token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Database;

    #[test]
    fn test_type_keys_compare_by_type() {
        assert_eq!(ProviderKey::of::<Database>(), ProviderKey::of::<Database>());
        assert_ne!(ProviderKey::of::<Database>(), ProviderKey::of::<String>());
        assert!(ProviderKey::of::<Database>().is_type::<Database>());
    }

    #[test]
    fn test_token_and_module_config_are_distinct() {
        let token = ProviderKey::token("users");
        let config = ProviderKey::module_config("users");
        assert_ne!(token, config);

        let mut set = HashSet::new();
        set.insert(token.clone());
        set.insert(config.clone());
        set.insert(ProviderKey::from("users"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(ProviderKey::token("cache").to_string(), "cache");
        assert_eq!(
            ProviderKey::module_config("blog").to_string(),
            "ModuleConfig(blog)"
        );
        assert!(ProviderKey::of::<Database>().to_string().ends_with("Database"));
    }
}
