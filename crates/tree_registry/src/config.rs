//! Configuration for tree resolution and the command-line tools

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use treelens_core::{DecodeOptions, PlainLanguageRules, AUTO_PLAIN_LANGUAGE_MAX_NODES};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// treelens configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeLensConfig {
    /// Where models are loaded from
    pub store: StoreConfig,
    /// Node description settings
    pub describe: DescribeConfig,
    /// Decoder settings
    pub decode: DecodeConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Model store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of `<id>.json` / `<id>.bin` model files
    pub model_directory: Option<PathBuf>,
    /// Keep loaded models in memory
    pub cache_models: bool,
}

/// Node description configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescribeConfig {
    /// Default plain-language mode when a request does not set one
    pub plain_language: PlainLanguageRules,
    /// Largest tree rendered with decision paths in `auto` mode
    pub auto_max_nodes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Run the NA routing validator on every decoded tree
    pub check_na_routing: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            model_directory: None,
            cache_models: true,
        }
    }
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            plain_language: PlainLanguageRules::Auto,
            auto_max_nodes: AUTO_PLAIN_LANGUAGE_MAX_NODES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TreeLensConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read config file: {}", e)))?;

        let config: TreeLensConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Serialization(format!("Failed to parse config: {}", e)))?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| {
            ConfigError::Serialization(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::Io(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Apply `TREELENS_*` environment variables, returning the keys changed
    pub fn apply_env_overrides(&mut self) -> Result<Vec<&'static str>, ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<Vec<&'static str>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();

        if let Some(val) = lookup("TREELENS_MODEL_DIR") {
            self.store.model_directory = Some(PathBuf::from(val));
            applied.push("store.model_directory");
        }

        if let Some(val) = lookup("TREELENS_CACHE_MODELS") {
            self.store.cache_models = parse_bool("TREELENS_CACHE_MODELS", &val)?;
            applied.push("store.cache_models");
        }

        if let Some(val) = lookup("TREELENS_PLAIN_LANGUAGE") {
            self.describe.plain_language = val.parse().map_err(ConfigError::Invalid)?;
            applied.push("describe.plain_language");
        }

        if let Some(val) = lookup("TREELENS_AUTO_MAX_NODES") {
            self.describe.auto_max_nodes = val.trim().parse().map_err(|e| {
                ConfigError::Invalid(format!("TREELENS_AUTO_MAX_NODES: {}", e))
            })?;
            applied.push("describe.auto_max_nodes");
        }

        if let Some(val) = lookup("TREELENS_CHECK_NA_ROUTING") {
            self.decode.check_na_routing = parse_bool("TREELENS_CHECK_NA_ROUTING", &val)?;
            applied.push("decode.check_na_routing");
        }

        if let Some(val) = lookup("TREELENS_LOG_LEVEL") {
            self.logging.level = val;
            applied.push("logging.level");
        }

        if !applied.is_empty() {
            info!("Environment overrides applied: {:?}", applied);
        }
        Ok(applied)
    }

    /// Check the configuration; hard errors fail, soft issues come back as warnings
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        if self.describe.auto_max_nodes == 0 {
            return Err(ConfigError::Invalid(
                "describe.auto_max_nodes must be at least 1".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }

        let mut warnings = Vec::new();
        match &self.store.model_directory {
            None => warnings.push("No model directory configured".to_string()),
            Some(dir) if !dir.is_dir() => {
                warnings.push(format!("Model directory {} does not exist", dir.display()))
            }
            Some(_) => {}
        }

        if warnings.is_empty() {
            info!("Configuration validation passed");
        } else {
            warn!("Configuration validation warnings: {:?}", warnings);
        }
        Ok(warnings)
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            check_na_routing: self.decode.check_na_routing,
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid(format!(
            "{name}: expected a boolean, got '{other}'"
        ))),
    }
}
