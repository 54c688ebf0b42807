//! Error types for container operations.

use thiserror::Error;

/// Errors raised while resolving a binding.
///
/// Every variant names the key that could not be produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    /// Nothing was bound under the key.
    #[error("No provider bound for key \"{key}\"")]
    Unbound { key: String },

    /// A constructor asked for a dependency that could not be resolved.
    #[error("Cannot construct \"{key}\": dependency \"{dependency}\" is not resolvable ({reason})")]
    Dependency {
        key: String,
        dependency: String,
        reason: String,
    },

    /// Resolution re-entered a key that is already being constructed.
    #[error("Circular resolution: {}", path.join(" -> "))]
    Circular { path: Vec<String> },

    /// The bound value is not of the requested type.
    #[error("Binding \"{key}\" does not hold a value of type {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// A constructor failed on its own.
    #[error("Constructor for \"{key}\" failed: {message}")]
    Construction { key: String, message: String },
}

impl ResolutionError {
    /// Create an Unbound error.
    pub fn unbound(key: impl ToString) -> Self {
        Self::Unbound {
            key: key.to_string(),
        }
    }

    /// Create a Construction error.
    pub fn construction(key: impl ToString, message: impl Into<String>) -> Self {
        Self::Construction {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// The key that could not be resolved.
    ///
    /// For dependency failures this is the dependency, not the dependant.
    #[must_use]
    pub fn offending_key(&self) -> &str {
        match self {
            Self::Unbound { key }
            | Self::TypeMismatch { key, .. }
            | Self::Construction { key, .. } => key,
            Self::Dependency { dependency, .. } => dependency,
            Self::Circular { path } => path.last().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unbound { .. } => "UNBOUND",
            Self::Dependency { .. } => "UNRESOLVABLE_DEPENDENCY",
            Self::Circular { .. } => "CIRCULAR_RESOLUTION",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::Construction { .. } => "CONSTRUCTION_FAILED",
        }
    }
}

/// Errors raised while binding a provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The descriptor is internally inconsistent.
    #[error("Malformed provider for \"{key}\": {reason}")]
    Malformed { key: String, reason: String },
}

impl ProviderError {
    /// Create a Malformed error.
    pub fn malformed(key: impl ToString, reason: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offending_key_for_dependency() {
        let err = ResolutionError::Dependency {
            key: "Blog".into(),
            dependency: "Database".into(),
            reason: "unbound".into(),
        };
        assert_eq!(err.offending_key(), "Database");
        assert_eq!(err.error_code(), "UNRESOLVABLE_DEPENDENCY");
    }

    #[test]
    fn test_circular_display() {
        let err = ResolutionError::Circular {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "Circular resolution: A -> B -> A");
        assert_eq!(err.offending_key(), "A");
    }

    #[test]
    fn test_malformed_display() {
        let err = ProviderError::malformed("", "empty token");
        assert_eq!(err.to_string(), "Malformed provider for \"\": empty token");
    }
}
