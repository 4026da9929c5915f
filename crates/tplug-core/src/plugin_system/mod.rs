//! # tplug Plugin System
//!
//! Discovery, ordering and lifecycle of plugins.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`info`]**: [`PluginInfo`], the descriptor of one plugin.
//! - **[`descriptor`]**: parsing `.teplg` XML files into [`PluginInfo`].
//! - **[`finder`]**: [`PluginFinder`] strategies; [`DefaultFinder`] scans directories.
//! - **[`dependency`]**: topological ordering of a batch by required plugins.
//! - **[`engine`]**: [`PluginEngine`] and the keyed [`EngineFactory`].
//! - **[`native`]** and **[`ffi`]**: loading shared libraries through a C ABI.
//! - **[`builtin`]**: plugins compiled into the host.
//! - **[`registry`]**: [`PluginRegistry`], which tracks every plugin as loaded,
//!   unloaded or broken.
//! - **[`traits`]**: the [`Plugin`] handle trait.
//! - **[`error`]**: [`PluginSystemError`].
pub mod builtin;
pub mod dependency;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod finder;
pub mod info;
pub mod native;
pub mod registry;
pub mod traits;

pub use builtin::BuiltinEngine;
pub use dependency::DependencyError;
pub use descriptor::get_installed_plugin;
pub use engine::{EngineFactory, PluginEngine};
pub use error::PluginSystemError;
pub use finder::{DefaultFinder, PluginFinder, StaticFinder};
pub use info::{PluginInfo, PluginInfoBuilder, Provider};
pub use native::NativeEngine;
pub use registry::PluginRegistry;
pub use traits::Plugin;

#[cfg(test)]
pub(crate) mod tests;
