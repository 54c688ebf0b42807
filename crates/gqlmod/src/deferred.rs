//! Values that are only known once init params and the module's init result
//! are available.

use std::fmt;

use serde_json::Value;

type DeferredFn<T> = Box<dyn Fn(&Value, &Value) -> T + Send + Sync>;

/// Either a value or a function producing it from
/// `(init_params, own_init_result)`.
pub enum Deferred<T> {
    Pending(DeferredFn<T>),
    Resolved(T),
}

impl<T> Deferred<T> {
    /// Wraps a function to be called during init.
    pub fn pending<F>(resolve: F) -> Self
    where
        F: Fn(&Value, &Value) -> T + Send + Sync + 'static,
    {
        Self::Pending(Box::new(resolve))
    }

    /// Settles the value. Already resolved values are returned unchanged and
    /// the function of a pending one is called exactly once.
    #[must_use]
    pub fn resolve(self, init_params: &Value, init_result: &Value) -> Self {
        match self {
            Self::Pending(resolve) => Self::Resolved(resolve(init_params, init_result)),
            resolved => resolved,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The value, if resolved.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Pending(_) => None,
        }
    }
}

impl<T: Default> Default for Deferred<T> {
    fn default() -> Self {
        Self::Resolved(T::default())
    }
}

impl<T> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Self::Resolved(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(_) => f.write_str("Pending(..)"),
            Self::Resolved(value) => f.debug_tuple("Resolved").field(value).finish(),
        }
    }
}
