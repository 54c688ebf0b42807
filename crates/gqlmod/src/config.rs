//! Engine configuration.
//!
//! Configuration can be given in code or loaded from `gqlmod.toml` with
//! [`loader::load_config`].
//!
//! # Example Configuration
//!
//! ```toml
//! [schema]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! query_type = "Query"
//! mutation_type = "Mutation"
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeConfig {
    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ComposeConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        self.schema.validate()?;
        self.logging.validate()
    }
}

/// Executable schema settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Maximum query depth allowed.
    /// Default: 15
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    /// Default: 500
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,

    /// Enable introspection queries.
    /// Default: true
    #[serde(default = "default_introspection")]
    pub introspection: bool,

    /// Query root type name, used when the merged type definitions carry no
    /// `schema { ... }` block.
    /// Default: "Query"
    #[serde(default = "default_query_type")]
    pub query_type: String,

    /// Mutation root type name. Only used if a type with this name exists.
    /// Default: "Mutation"
    #[serde(default = "default_mutation_type")]
    pub mutation_type: String,

    /// Subscription root type name.
    /// Default: none
    #[serde(default)]
    pub subscription_type: Option<String>,
}

fn default_max_depth() -> usize {
    15
}

fn default_max_complexity() -> usize {
    500
}

fn default_introspection() -> bool {
    true
}

fn default_query_type() -> String {
    "Query".to_string()
}

fn default_mutation_type() -> String {
    "Mutation".to_string()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            introspection: default_introspection(),
            query_type: default_query_type(),
            mutation_type: default_mutation_type(),
            subscription_type: None,
        }
    }
}

impl SchemaConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("schema.max_depth must be > 0".into());
        }
        if self.max_complexity == 0 {
            return Err("schema.max_complexity must be > 0".into());
        }
        if self.query_type.trim().is_empty() {
            return Err("schema.query_type must not be empty".into());
        }
        if self.mutation_type.trim().is_empty() {
            return Err("schema.mutation_type must not be empty".into());
        }
        if self
            .subscription_type
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err("schema.subscription_type must not be empty when set".into());
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "gqlmod=debug,info".
    /// Default: "info"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LoggingConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the level is empty.
    pub fn validate(&self) -> Result<(), String> {
        if self.level.trim().is_empty() {
            return Err("logging.level must not be empty".into());
        }
        Ok(())
    }
}

pub mod loader {
    use super::ComposeConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    /// Default configuration file, looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "gqlmod.toml";

    /// Loads configuration from an optional TOML file plus environment
    /// overrides such as `GQLMOD__SCHEMA__MAX_DEPTH=10`.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_config(path: Option<&str>) -> Result<ComposeConfig, String> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        builder = builder.add_source(
            Environment::with_prefix("GQLMOD")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: ComposeConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<ComposeConfig, String> {
        let path = path.as_ref().to_string_lossy().to_string();
        load_config(Some(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ComposeConfig::default();
        assert_eq!(config.schema.max_depth, 15);
        assert_eq!(config.schema.max_complexity, 500);
        assert!(config.schema.introspection);
        assert_eq!(config.schema.query_type, "Query");
        assert_eq!(config.schema.mutation_type, "Mutation");
        assert!(config.schema.subscription_type.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_max_depth() {
        let mut config = ComposeConfig::default();
        config.schema.max_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_root_names() {
        let mut config = SchemaConfig::default();
        config.query_type = " ".into();
        assert!(config.validate().is_err());

        let mut config = SchemaConfig::default();
        config.subscription_type = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let toml_str = r#"
            [schema]
            max_depth = 7
            introspection = false
        "#;

        let config: ComposeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.schema.max_depth, 7);
        assert!(!config.schema.introspection);
        assert_eq!(config.schema.max_complexity, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[schema]\nmax_complexity = 42\n\n[logging]\nlevel = \"debug\"").unwrap();

        let config = loader::load_config_from_path(file.path()).unwrap();
        assert_eq!(config.schema.max_complexity, 42);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[schema]\nmax_depth = 0").unwrap();

        assert!(loader::load_config_from_path(file.path()).is_err());
    }
}
