//! Error types for module composition.
//!
//! Hook failures are always tagged with the module that raised them. Init
//! failures are fatal to the engine; context failures only to the request
//! that triggered them.

use gqlmod_di::{ProviderError, ResolutionError};
use thiserror::Error;

use crate::engine::EngineState;

/// Error returned by user-supplied hooks (`on_init`, context builders,
/// implementation factories, init param factories).
#[derive(Debug, Error)]
pub enum HookError {
    /// Hook execution failed with a message.
    #[error("{0}")]
    Execution(String),

    /// Hook failed resolving something from the container.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Generic error with source.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    /// Create an execution error from a string.
    pub fn execution(msg: impl Into<String>) -> Self {
        HookError::Execution(msg.into())
    }
}

/// Errors raised while merging or building the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A type definition fragment is not valid SDL.
    #[error("Invalid type definitions: {0}")]
    Parse(String),

    /// Two definitions share a name but not a kind.
    #[error("Type \"{name}\" is defined as both {first} and {second}")]
    Conflict {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    /// The executable schema could not be assembled.
    #[error("Failed to build executable schema: {0}")]
    Build(String),
}

/// Errors raised by the composition engine.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// An `on_init` hook failed.
    #[error("Unable to initialize module \"{module}\": {source}")]
    Initialization {
        module: String,
        #[source]
        source: HookError,
    },

    /// A context builder failed.
    #[error("Unable to build context, module \"{module}\" failed: {source}")]
    ContextBuild {
        module: String,
        #[source]
        source: HookError,
    },

    /// An implementation factory failed.
    #[error("Unable to build implementation of module \"{module}\": {source}")]
    Implementation {
        module: String,
        #[source]
        source: HookError,
    },

    /// The init params factory failed.
    #[error("Unable to resolve init params: {0}")]
    InitParams(#[source] HookError),

    /// Container resolution failed.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A provider descriptor was rejected at bind time.
    #[error(transparent)]
    MalformedProvider(#[from] ProviderError),

    /// Schema merge or build failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Two modules share a name.
    #[error("Duplicate module name: {0}")]
    DuplicateModule(String),

    /// The operation is not allowed in the engine's current state.
    #[error("Engine is {actual}, expected {expected}")]
    InvalidState {
        expected: EngineState,
        actual: EngineState,
    },
}

impl ComposeError {
    /// Name of the module the failure is attributed to, if any.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        match self {
            Self::Initialization { module, .. }
            | Self::ContextBuild { module, .. }
            | Self::Implementation { module, .. } => Some(module),
            Self::DuplicateModule(module) => Some(module),
            _ => None,
        }
    }

    /// Returns whether the engine can keep serving after this error.
    ///
    /// Only per-request failures are recoverable.
    #[must_use]
    pub fn is_request_scoped(&self) -> bool {
        matches!(self, Self::ContextBuild { .. })
    }

    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Initialization { .. } => "INITIALIZATION_FAILED",
            Self::ContextBuild { .. } => "CONTEXT_BUILD_FAILED",
            Self::Implementation { .. } => "IMPLEMENTATION_FAILED",
            Self::InitParams(_) => "INIT_PARAMS_FAILED",
            Self::Resolution(_) => "RESOLUTION_FAILED",
            Self::MalformedProvider(_) => "MALFORMED_PROVIDER",
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::DuplicateModule(_) => "DUPLICATE_MODULE",
            Self::InvalidState { .. } => "INVALID_STATE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_attribution() {
        let err = ComposeError::Initialization {
            module: "B".into(),
            source: HookError::execution("boom"),
        };
        assert_eq!(err.module(), Some("B"));
        assert_eq!(err.to_string(), "Unable to initialize module \"B\": boom");
        assert!(!err.is_request_scoped());
    }

    #[test]
    fn test_context_build_is_request_scoped() {
        let err = ComposeError::ContextBuild {
            module: "auth".into(),
            source: HookError::execution("no token"),
        };
        assert!(err.is_request_scoped());
        assert_eq!(err.error_code(), "CONTEXT_BUILD_FAILED");
    }

    #[test]
    fn test_hook_error_from_anyhow() {
        let err: HookError = anyhow::anyhow!("database offline").into();
        assert_eq!(err.to_string(), "database offline");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = ComposeError::InvalidState {
            expected: EngineState::Constructed,
            actual: EngineState::Ready,
        };
        assert_eq!(err.to_string(), "Engine is ready, expected constructed");
    }
}
