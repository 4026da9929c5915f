//! # tplug Plugin System Errors
//!
//! Defines error types specific to the plugin system.
//!
//! [`PluginSystemError`] covers every failure a plugin operation can surface:
//! descriptor discovery and parsing, dependency checks, engine resolution,
//! native loading, lifecycle calls and batch loads. Dependency ordering
//! problems are reported through [`DependencyError`](crate::plugin_system::dependency::DependencyError)
//! and wrapped here.
use std::path::PathBuf;

use crate::plugin_system::dependency::DependencyError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Invalid plugin directory '{}': {reason}", path.display())]
    InvalidDirectory { path: PathBuf, reason: String },

    #[error("Invalid plugin path '{}': {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Plugin descriptor error for '{}': {message}", path.display())]
    DescriptorParse {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Plugin '{0}' is already loaded")]
    AlreadyLoaded(String),

    #[error("Plugin '{0}' is already registered in the manager")]
    DuplicatePlugin(String),

    #[error("Plugin '{plugin}' requires plugins that are not loaded: {}", missing.join(", "))]
    UnsatisfiedDependency { plugin: String, missing: Vec<String> },

    #[error("No plugin engine registered under '{engine}' (required by '{plugin}')")]
    EngineNotFound { plugin: String, engine: String },

    #[error("Engine failed to load plugin '{plugin}': {source}")]
    EngineLoad {
        plugin: String,
        #[source]
        source: Box<PluginSystemError>,
    },

    #[error("Plugin '{plugin}' failed to start: {message}")]
    Startup { plugin: String, message: String },

    #[error("Plugin '{plugin}' failed to shut down: {message}")]
    Shutdown { plugin: String, message: String },

    #[error("Could not find plugin '{0}'")]
    NotFound(String),

    #[error("Plugin '{0}' is not loaded")]
    NotLoaded(String),

    #[error("Plugin '{plugin}' is required by: {}", dependents.join(", "))]
    DependentsExist { plugin: String, dependents: Vec<String> },

    #[error("Module '{module}' failed to initialize: {message}")]
    ModuleInitialization { module: String, message: String },

    #[error("Module '{0}' is already registered")]
    ModuleAlreadyRegistered(String),

    #[error("FFI error in plugin '{plugin}' during '{operation}': {message}")]
    Ffi {
        plugin: String,
        operation: String,
        message: String,
    },

    #[error("Dependency resolution failed: {0}")]
    DependencyResolution(#[from] DependencyError),

    #[error("Plugins not loaded: {}", failed.join(", "))]
    BatchLoad { failed: Vec<String> },
}

impl PluginSystemError {
    /// Wraps an engine-side failure for `plugin`.
    pub fn engine_load(plugin: impl Into<String>, source: PluginSystemError) -> Self {
        PluginSystemError::EngineLoad {
            plugin: plugin.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, PluginSystemError>;
