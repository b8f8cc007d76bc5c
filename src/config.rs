//! Configuration management for the validator
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (jsonschema.toml)
//! - Environment variables (JSONSCHEMA__*)
//!
//! ## Example config file (jsonschema.toml):
//! ```toml
//! [loader]
//! strict = false
//! default_draft = "draft6"
//! base_uri = "json-schema:///"
//! schema_dirs = ["./schemas"]
//!
//! [fetch]
//! allow_file = true
//! timeout_ms = 5000
//! retries = 2
//!
//! [validation]
//! formats = true
//!
//! [logging]
//! filter = "info"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::Result;
use crate::keyword::Draft;
use crate::loader::{DocumentFetcher, FileFetcher, LoaderOptions, NoFetcher, RetryingFetcher, SchemaLoader};
use crate::location::DEFAULT_BASE_URI;
use crate::validator::CompileOptions;

/// Main configuration for loading and validating
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Loader settings
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Document fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Abort on the first error-level loading issue
    #[serde(default)]
    pub strict: bool,

    /// Draft for documents without a recognized `$schema`
    #[serde(default)]
    pub default_draft: Draft,

    /// URI of documents loaded without one
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// Directories whose `*.json` documents are preloaded
    #[serde(default)]
    pub schema_dirs: Vec<PathBuf>,
}

/// Fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Read `file://` references from disk
    #[serde(default = "default_true")]
    pub allow_file: bool,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts after the first failure
    #[serde(default = "default_retries")]
    pub retries: u32,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Check `format`; when false it is an annotation only
    #[serde(default = "default_true")]
    pub formats: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber` filter used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_base_uri() -> String {
    DEFAULT_BASE_URI.to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_retries() -> u32 {
    2
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strict: false,
            default_draft: Draft::default(),
            base_uri: default_base_uri(),
            schema_dirs: Vec::new(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            allow_file: true,
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { formats: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_filter() }
    }
}

impl ValidatorConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, with `config_path` taking precedence over the
    /// default locations
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["jsonschema.toml", ".jsonschema.toml", "config/jsonschema.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "jsonschema") {
            let xdg_config = config_dir.config_dir().join("jsonschema.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // JSONSCHEMA__LOADER__STRICT=true
        builder = builder.add_source(
            Environment::with_prefix("JSONSCHEMA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn loader_options(&self) -> Result<LoaderOptions> {
        Ok(LoaderOptions::default()
            .strict(self.loader.strict)
            .default_draft(self.loader.default_draft)
            .base_uri(Url::parse(&self.loader.base_uri)?))
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::default().validate_formats(self.validation.formats)
    }

    pub fn fetcher(&self) -> Arc<dyn DocumentFetcher> {
        if !self.fetch.allow_file {
            return Arc::new(NoFetcher);
        }
        Arc::new(RetryingFetcher::new(
            Arc::new(FileFetcher),
            self.fetch.retries,
            Duration::from_millis(self.fetch.timeout_ms),
        ))
    }

    /// A loader with this configuration's options, fetcher and preloaded
    /// schema directories
    pub fn build_loader(&self) -> Result<SchemaLoader> {
        let mut loader = SchemaLoader::with_options(self.loader_options()?).with_fetcher(self.fetcher());
        for dir in &self.loader.schema_dirs {
            loader.preload_dir(dir, None)?;
        }
        Ok(loader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidatorConfig::default();
        assert!(!config.loader.strict);
        assert_eq!(config.loader.default_draft, Draft::Draft6);
        assert_eq!(config.fetch.retries, 2);
        assert!(config.validation.formats);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_serialize_config() {
        let config = ValidatorConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[loader]"));
        assert!(toml_str.contains("[fetch]"));
        assert!(toml_str.contains("default_draft = \"draft6\""));
    }

    #[test]
    fn test_loader_options_conversion() {
        let mut config = ValidatorConfig::default();
        config.loader.strict = true;
        config.loader.base_uri = "http://example.com/root.json".to_string();
        let options = config.loader_options().unwrap();
        assert!(options.strict);
        assert_eq!(options.base_uri.as_str(), "http://example.com/root.json");

        config.loader.base_uri = "not a uri".to_string();
        assert!(config.loader_options().is_err());
    }
}
