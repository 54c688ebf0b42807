//! Tracing setup for hosts embedding the engine.
//!
//! The engine only emits `tracing` events; installing a subscriber is up to
//! the host. These helpers install a `fmt` subscriber whose filter can be
//! swapped at runtime, e.g. after reloading `gqlmod.toml`.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing() -> bool {
    init_tracing_with_level("info")
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is kept.
pub fn init_tracing_with_level(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (filter_layer, handle) = reload::Layer::new(filter);
    let installed = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();

    if installed {
        let _ = FILTER_HANDLE.set(handle);
    }
    installed
}

pub fn init_tracing_from_config(config: &LoggingConfig) -> bool {
    init_tracing_with_level(&config.level)
}

/// Replaces the active filter.
///
/// # Errors
///
/// Returns an error if `level` is not a valid filter directive or the
/// subscriber was not installed by [`init_tracing_with_level`].
pub fn apply_logging_level(level: &str) -> Result<(), String> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| format!("invalid log filter \"{level}\": {e}"))?;
    let handle = FILTER_HANDLE
        .get()
        .ok_or_else(|| "tracing was not initialized by gqlmod".to_string())?;
    handle
        .modify(|current| *current = filter)
        .map_err(|e| format!("failed to reload log filter: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_rejected() {
        let err = apply_logging_level("gqlmod=[").unwrap_err();
        assert!(err.contains("invalid log filter"));
    }

    #[test]
    fn test_level_can_be_reloaded_after_init() {
        init_tracing_from_config(&LoggingConfig::default());
        // Another test binary may own the global subscriber
        if FILTER_HANDLE.get().is_some() {
            assert!(apply_logging_level("gqlmod=debug").is_ok());
        }
    }
}
