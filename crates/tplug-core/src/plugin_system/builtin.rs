use std::collections::HashMap;

use crate::kernel::module::ModuleRegistry;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::engine::PluginEngine;
use crate::plugin_system::info::PluginInfo;
use crate::plugin_system::traits::Plugin;

type Factory = Box<dyn Fn(&PluginInfo, &mut ModuleRegistry) -> Result<Box<dyn Plugin>> + Send + Sync>;

/// Engine for plugins compiled into the host.
///
/// Each plugin name maps to a factory closure. Register it with an
/// [`EngineFactory`](crate::plugin_system::engine::EngineFactory) under
/// [`BUILTIN_ENGINE`](crate::kernel::constants::BUILTIN_ENGINE) once every
/// factory is added.
#[derive(Default)]
pub struct BuiltinEngine {
    factories: HashMap<String, Factory>,
}

impl BuiltinEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory for the plugin called `name`
    pub fn add<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&PluginInfo, &mut ModuleRegistry) -> Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl PluginEngine for BuiltinEngine {
    fn load(&self, info: &PluginInfo, modules: &mut ModuleRegistry) -> Result<Box<dyn Plugin>> {
        let factory = self
            .factories
            .get(&info.name)
            .ok_or_else(|| PluginSystemError::NotFound(info.name.clone()))?;
        factory(info, modules)
    }

    fn unload(&self, plugin: Box<dyn Plugin>) -> Result<()> {
        log::debug!("Releasing builtin plugin '{}'", plugin.info().name);
        drop(plugin);
        Ok(())
    }
}
