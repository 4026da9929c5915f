use std::fmt;

use crate::plugin_system::error::Result;
use crate::plugin_system::info::PluginInfo;

/// Run-time handle of a loaded plugin.
///
/// Handles are produced by a [`PluginEngine`](crate::plugin_system::engine::PluginEngine)
/// and owned by the registry until they are unloaded or detached.
pub trait Plugin: Send {
    /// Descriptor the plugin was loaded from
    fn info(&self) -> &PluginInfo;

    /// Whether `startup` has completed and `shutdown` has not been called since
    fn is_started(&self) -> bool;

    /// Bring the plugin up. Called at most once per start cycle.
    fn startup(&mut self) -> Result<()>;

    /// Release whatever `startup` acquired
    fn shutdown(&mut self) -> Result<()>;

    fn name(&self) -> &str {
        &self.info().name
    }
}

impl fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.info().name)
            .field("engine", &self.info().engine)
            .field("started", &self.is_started())
            .finish()
    }
}
