//! Configuration management for script-loader
//!
//! Handles configuration loading, validation, and environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::utils::{env_bool, env_opt};

/// Environment variable overriding `tolerate_unknown`
pub const ENV_TOLERATE_UNKNOWN: &str = "SCRIPT_LOADER_TOLERATE_UNKNOWN";
/// Environment variable overriding `skip_bootstrap`
pub const ENV_SKIP_BOOTSTRAP: &str = "SCRIPT_LOADER_SKIP_BOOTSTRAP";
/// Environment variable overriding `bootstrap_package`
pub const ENV_BOOTSTRAP_PACKAGE: &str = "SCRIPT_LOADER_BOOTSTRAP";

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Treat Hard dependencies on unknown packages as satisfied
    #[serde(default)]
    pub tolerate_unknown: bool,

    /// Suppress host notifications for the bootstrap package and its file
    #[serde(default)]
    pub skip_bootstrap: bool,

    /// Name of the package the loader itself provides
    #[serde(default = "default_bootstrap_package")]
    pub bootstrap_package: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_bootstrap_package() -> String {
    "load".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            tolerate_unknown: false,
            skip_bootstrap: false,
            bootstrap_package: default_bootstrap_package(),
            logging: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "script_loader=debug"); RUST_LOG takes precedence
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON logs (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

impl LoaderConfig {
    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, choosing the format by file extension (TOML unless `.json`)
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path)?,
            _ => Self::from_toml_file(path)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `SCRIPT_LOADER_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if env_opt(ENV_TOLERATE_UNKNOWN).is_some() {
            self.tolerate_unknown = env_bool(ENV_TOLERATE_UNKNOWN);
        }
        if env_opt(ENV_SKIP_BOOTSTRAP).is_some() {
            self.skip_bootstrap = env_bool(ENV_SKIP_BOOTSTRAP);
        }
        if let Some(name) = env_opt(ENV_BOOTSTRAP_PACKAGE) {
            self.bootstrap_package = name;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.skip_bootstrap && self.bootstrap_package.is_empty() {
            return Err(anyhow::anyhow!(
                "bootstrap_package must be set when skip_bootstrap is enabled"
            ));
        }

        if let Some(ref logging) = self.logging {
            if logging.filter.as_deref() == Some("") {
                return Err(anyhow::anyhow!("logging.filter must not be empty when set"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: LoaderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.bootstrap_package, "load");
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.toml");
        std::fs::write(
            &path,
            "tolerate_unknown = true\nskip_bootstrap = true\n\n[logging]\nfilter = \"debug\"\n",
        )
        .unwrap();

        let config = LoaderConfig::from_file(&path).unwrap();
        assert!(config.tolerate_unknown);
        assert!(config.skip_bootstrap);
        assert_eq!(
            config.logging.and_then(|l| l.filter),
            Some("debug".to_string())
        );
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.json");
        let config = LoaderConfig {
            tolerate_unknown: true,
            ..LoaderConfig::default()
        };
        config.to_json_file(&path).unwrap();
        assert_eq!(LoaderConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validate() {
        let config = LoaderConfig {
            skip_bootstrap: true,
            bootstrap_package: String::new(),
            ..LoaderConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LoaderConfig {
            logging: Some(LoggingConfig {
                filter: Some(String::new()),
                json_format: false,
            }),
            ..LoaderConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(LoaderConfig::default().validate().is_ok());
    }
}
