use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::kernel::constants::{NATIVE_ENGINE, NATIVE_ENGINE_ALIAS};
use crate::kernel::module::ModuleRegistry;
use crate::plugin_system::error::Result;
use crate::plugin_system::info::PluginInfo;
use crate::plugin_system::native::NativeEngine;
use crate::plugin_system::traits::Plugin;

/// Turns descriptors into live plugins and tears them down again
pub trait PluginEngine: Send + Sync {
    /// Instantiate the plugin described by `info`.
    ///
    /// Modules the plugin registers go into `modules`; the caller initializes
    /// them once this returns.
    fn load(&self, info: &PluginInfo, modules: &mut ModuleRegistry) -> Result<Box<dyn Plugin>>;

    /// Release a handle produced by [`load`](Self::load). The handle must not
    /// be used afterwards.
    fn unload(&self, plugin: Box<dyn Plugin>) -> Result<()>;
}

/// Engines keyed by [`PluginInfo::engine`]
#[derive(Clone)]
pub struct EngineFactory {
    engines: HashMap<String, Arc<dyn PluginEngine>>,
}

impl EngineFactory {
    /// A factory with no engines
    pub fn empty() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// Register `engine` under `key`, replacing any previous one
    pub fn register(&mut self, key: &str, engine: Arc<dyn PluginEngine>) -> Option<Arc<dyn PluginEngine>> {
        self.engines.insert(key.to_string(), engine)
    }

    pub fn unregister(&mut self, key: &str) -> Option<Arc<dyn PluginEngine>> {
        self.engines.remove(key)
    }

    /// Engine for `key`. `None` is a load failure for the caller, not a panic.
    pub fn make(&self, key: &str) -> Option<Arc<dyn PluginEngine>> {
        self.engines.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.engines.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.engines.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for EngineFactory {
    /// Native engine under both its keys
    fn default() -> Self {
        let mut factory = Self::empty();
        let native: Arc<dyn PluginEngine> = Arc::new(NativeEngine::new());
        factory.register(NATIVE_ENGINE, Arc::clone(&native));
        factory.register(NATIVE_ENGINE_ALIAS, native);
        factory
    }
}

impl fmt::Debug for EngineFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineFactory").field("keys", &self.keys()).finish()
    }
}
