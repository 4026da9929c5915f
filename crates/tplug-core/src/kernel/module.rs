//! Registry of host framework modules.
//!
//! Loading a plugin may register further modules as a side effect. The plugin
//! registry samples [`ModuleRegistry::len`] before the load and calls
//! [`ModuleRegistry::initialize_from`] afterwards, so exactly the modules added
//! by that load are initialized, in registration order. Those modules are then
//! claimed by the plugin and released again when it is unloaded.
use std::fmt;

use crate::plugin_system::error::{PluginSystemError, Result};

type InitializeFn = Box<dyn Fn() -> std::result::Result<(), String> + Send + Sync>;
type FinalizeFn = Box<dyn Fn() + Send + Sync>;

struct ModuleEntry {
    name: String,
    initialize: InitializeFn,
    finalize: FinalizeFn,
    initialized: bool,
    owner: Option<String>,
}

/// Ordered `(name, initialize, finalize)` registry
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<ModuleEntry>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.modules.iter().map(|m| (&m.name, m.initialized)))
            .finish()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module. Names are unique.
    pub fn register<I, F>(&mut self, name: &str, initialize: I, finalize: F) -> Result<()>
    where
        I: Fn() -> std::result::Result<(), String> + Send + Sync + 'static,
        F: Fn() + Send + Sync + 'static,
    {
        if self.contains(name) {
            return Err(PluginSystemError::ModuleAlreadyRegistered(name.to_string()));
        }
        log::debug!("Module '{}' registered at index {}", name, self.modules.len());
        self.modules.push(ModuleEntry {
            name: name.to_string(),
            initialize: Box::new(initialize),
            finalize: Box::new(finalize),
            initialized: false,
            owner: None,
        });
        Ok(())
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name == name)
    }

    /// Module names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name == name && m.initialized)
    }

    /// Run the initializer at `index`. A module is initialized at most once.
    pub fn initialize(&mut self, index: usize) -> Result<()> {
        let entry = self.modules.get_mut(index).ok_or_else(|| {
            PluginSystemError::ModuleInitialization {
                module: format!("#{}", index),
                message: "no module registered at this index".to_string(),
            }
        })?;

        if entry.initialized {
            return Ok(());
        }

        (entry.initialize)().map_err(|message| PluginSystemError::ModuleInitialization {
            module: entry.name.clone(),
            message,
        })?;
        entry.initialized = true;
        log::debug!("Module '{}' initialized", entry.name);
        Ok(())
    }

    /// Initialize every module registered at `start` or later, stopping at
    /// the first failure
    pub fn initialize_from(&mut self, start: usize) -> Result<()> {
        for index in start..self.modules.len() {
            self.initialize(index)?;
        }
        Ok(())
    }

    /// Record `owner` as the owner of every module registered at `start` or later
    pub fn claim_from(&mut self, start: usize, owner: &str) {
        for entry in self.modules.iter_mut().skip(start) {
            entry.owner = Some(owner.to_string());
        }
    }

    /// Plugin that registered `name`, if it has been claimed
    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.modules
            .iter()
            .find(|m| m.name == name)
            .and_then(|m| m.owner.as_deref())
    }

    /// Finalize and drop every module owned by `owner`, newest first.
    /// Returns how many modules were removed.
    pub fn release(&mut self, owner: &str) -> usize {
        let before = self.modules.len();
        for entry in self.modules.iter_mut().rev() {
            if entry.owner.as_deref() == Some(owner) {
                Self::finalize_entry(entry);
            }
        }
        self.modules.retain(|m| m.owner.as_deref() != Some(owner));
        let released = before - self.modules.len();
        if released > 0 {
            log::debug!("Released {} module(s) of plugin '{}'", released, owner);
        }
        released
    }

    /// Finalize and drop every module registered at `start` or later, newest first
    pub fn truncate(&mut self, start: usize) {
        for entry in self.modules.iter_mut().skip(start).rev() {
            Self::finalize_entry(entry);
        }
        self.modules.truncate(start);
    }

    /// Finalize initialized modules, newest first
    pub fn finalize_all(&mut self) {
        for entry in self.modules.iter_mut().rev() {
            Self::finalize_entry(entry);
        }
    }

    fn finalize_entry(entry: &mut ModuleEntry) {
        if entry.initialized {
            (entry.finalize)();
            entry.initialized = false;
            log::debug!("Module '{}' finalized", entry.name);
        }
    }
}
