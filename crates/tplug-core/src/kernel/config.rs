use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::constants::STATE_FILE_NAME;
use crate::utils::fs::write_file;

/// Errors raised while reading or writing host configuration and state
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error during '{operation}' on '{}': {source}", path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization to '{format}' failed: {source}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Deserialization from '{format}' failed: {source}")]
    Deserialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Unsupported configuration format for path: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// Serialize a value to a string in this format
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<String, ConfigError> {
        let wrap = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::Serialization {
            format: self.extension().to_string(),
            source,
        };
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value).map_err(|e| wrap(Box::new(e))),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(|e| wrap(Box::new(e))),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(value).map_err(|e| wrap(Box::new(e))),
        }
    }

    /// Deserialize a value from a string in this format
    pub fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T, ConfigError> {
        let wrap = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::Deserialization {
            format: self.extension().to_string(),
            source,
        };
        match self {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| wrap(Box::new(e))),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| wrap(Box::new(e))),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| wrap(Box::new(e))),
        }
    }
}

/// Read a value from `path`, picking the format from its extension
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read".to_string(),
        path: path.to_path_buf(),
        source,
    })?;
    format.deserialize(&data)
}

/// Write a value to `path`, picking the format from its extension
pub fn save_config<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let data = format.serialize(value)?;
    write_file(path, &data).map_err(|source| ConfigError::Io {
        operation: "write".to_string(),
        path: path.to_path_buf(),
        source,
    })
}

/// Host-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Extra directories scanned for descriptors
    pub plugin_dirs: Vec<PathBuf>,

    /// Also scan the default search directories
    pub use_default_dirs: bool,

    /// Start plugins as they are loaded
    pub auto_start: bool,

    /// Where partition names are persisted between runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugin_dirs: Vec::new(),
            use_default_dirs: true,
            auto_start: true,
            state_file: None,
        }
    }
}

impl HostConfig {
    /// Load host settings from a JSON, YAML or TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// State file path, defaulting to `plugins.json` under `base`
    pub fn state_file_or(&self, base: &Path) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| base.join(STATE_FILE_NAME))
    }
}

/// Names of the plugins in each partition, as persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginState {
    pub enabled: Vec<String>,
    pub unloaded: Vec<String>,
    pub broken: Vec<String>,
}

impl PluginState {
    /// Read persisted state. A missing file means no state was saved.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        load_config(path).map(Some)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        save_config(path, self)
    }

    /// Whether `name` is mentioned in any list
    pub fn mentions(&self, name: &str) -> bool {
        self.enabled.iter().chain(&self.unloaded).chain(&self.broken).any(|n| n == name)
    }
}
