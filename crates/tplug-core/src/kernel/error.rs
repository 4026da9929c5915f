//! # tplug Core Kernel Errors
//!
//! [`Error`] is the crate-level error: every subsystem error folds into it
//! through `From`, so host code can use `?` across the plugin system and the
//! configuration layer alike.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::kernel::config::ConfigError;
use crate::plugin_system::error::PluginSystemError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Configuration or persisted state could not be read or written
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;
