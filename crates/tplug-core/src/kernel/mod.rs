//! # tplug Core Kernel
//!
//! Application-level pieces around the plugin system:
//!
//! - [`host`]: [`PluginHost`], the owner of the registry behind an async mutex,
//!   with state restore and persistence.
//! - [`module`]: [`ModuleRegistry`], host modules registered as a side effect of
//!   plugin loading.
//! - [`config`]: host settings and persisted plugin state in JSON, YAML or TOML.
//! - [`constants`]: file conventions, environment variables and engine keys.
//! - [`error`]: the crate-level [`Error`] and `Result` alias.
pub mod config;
pub mod constants;
pub mod error;
pub mod host;
pub mod module;

pub use config::{ConfigError, ConfigFormat, HostConfig, PluginState};
pub use error::{Error, Result};
pub use host::PluginHost;
pub use module::ModuleRegistry;
