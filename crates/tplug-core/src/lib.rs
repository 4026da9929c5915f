//! Dependency-aware plugin manager.
//!
//! Plugins are described by XML descriptors, ordered by the plugins they
//! require, loaded through a keyed engine and tracked as loaded, unloaded or
//! broken. See [`plugin_system::PluginRegistry`] for the core state machine and
//! [`kernel::PluginHost`] for the application-level entry point.
pub mod kernel;
pub mod plugin_system;
pub mod utils;

pub use kernel::error::Error as KernelError;
pub use kernel::{HostConfig, PluginHost};
pub use plugin_system::{Plugin, PluginInfo, PluginRegistry, PluginSystemError};
