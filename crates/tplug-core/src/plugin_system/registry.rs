//! The plugin registry: owner of every known plugin.
//!
//! Each plugin name lives in exactly one partition:
//!
//! - **loaded**: a live [`Plugin`] handle, kept in load order;
//! - **unloaded**: a descriptor known but not instantiated;
//! - **broken**: a descriptor that failed to load or lost a dependency.
//!
//! Every mutation removes a name from its old partition before inserting it
//! into the new one. Failures are recorded (the descriptor moves to broken)
//! and then returned; they are never rolled back.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::kernel::module::ModuleRegistry;
use crate::plugin_system::dependency::{self, DependencyError};
use crate::plugin_system::engine::EngineFactory;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::finder::{DefaultFinder, PluginFinder};
use crate::plugin_system::info::PluginInfo;
use crate::plugin_system::traits::Plugin;

fn position(list: &[PluginInfo], name: &str) -> Option<usize> {
    list.iter().position(|info| info.name == name)
}

fn take_named(list: &mut Vec<PluginInfo>, name: &str) -> Option<PluginInfo> {
    position(list, name).map(|idx| list.remove(idx))
}

/// Dependency-aware plugin manager
pub struct PluginRegistry {
    finders: Vec<Box<dyn PluginFinder>>,
    engines: EngineFactory,
    modules: ModuleRegistry,
    plugins: HashMap<String, Box<dyn Plugin>>,
    load_order: Vec<String>,
    categories: BTreeMap<String, Vec<String>>,
    declared_categories: BTreeSet<String>,
    unloaded: Vec<PluginInfo>,
    broken: Vec<PluginInfo>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("loaded", &self.load_order)
            .field("unloaded", &self.unloaded.iter().map(|i| &i.name).collect::<Vec<_>>())
            .field("broken", &self.broken.iter().map(|i| &i.name).collect::<Vec<_>>())
            .field("engines", &self.engines)
            .field("modules", &self.modules)
            .finish()
    }
}

impl PluginRegistry {
    /// Registry with the default engines and an empty module registry
    pub fn new() -> Self {
        Self::with_engines(EngineFactory::default())
    }

    pub fn with_engines(engines: EngineFactory) -> Self {
        Self {
            finders: Vec::new(),
            engines,
            modules: ModuleRegistry::new(),
            plugins: HashMap::new(),
            load_order: Vec::new(),
            categories: BTreeMap::new(),
            declared_categories: BTreeSet::new(),
            unloaded: Vec::new(),
            broken: Vec::new(),
        }
    }

    // --- Collaborators ---

    /// Add a descriptor source. Without any, `load_all` uses a [`DefaultFinder`].
    pub fn add_finder(&mut self, finder: Box<dyn PluginFinder>) {
        self.finders.push(finder);
    }

    pub fn engines(&self) -> &EngineFactory {
        &self.engines
    }

    pub fn engines_mut(&mut self) -> &mut EngineFactory {
        &mut self.engines
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.modules
    }

    // --- Queries ---

    /// Every known name: loaded in load order, then unloaded, then broken
    pub fn plugins(&self) -> Vec<String> {
        self.load_order
            .iter()
            .cloned()
            .chain(self.unloaded.iter().map(|i| i.name.clone()))
            .chain(self.broken.iter().map(|i| i.name.clone()))
            .collect()
    }

    pub fn num_plugins(&self) -> usize {
        self.plugins.len() + self.unloaded.len() + self.broken.len()
    }

    /// Descriptor of `name`, whichever partition it is in
    pub fn plugin(&self, name: &str) -> Result<&PluginInfo> {
        if let Some(plugin) = self.plugins.get(name) {
            return Ok(plugin.info());
        }
        self.unloaded
            .iter()
            .chain(self.broken.iter())
            .find(|info| info.name == name)
            .ok_or_else(|| PluginSystemError::NotFound(name.to_string()))
    }

    /// Live handle of a loaded plugin
    pub fn get(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins.get(name).map(|p| p.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Plugin + 'static)> {
        self.plugins.get_mut(name).map(|p| p.as_mut())
    }

    /// Descriptors of loaded plugins in load order
    pub fn loaded_plugins(&self) -> Vec<&PluginInfo> {
        self.load_order
            .iter()
            .filter_map(|name| self.plugins.get(name))
            .map(|p| p.info())
            .collect()
    }

    pub fn unloaded_plugins(&self) -> &[PluginInfo] {
        &self.unloaded
    }

    pub fn broken_plugins(&self) -> &[PluginInfo] {
        &self.broken
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Whether every name in `names` is loaded. True for an empty list.
    pub fn is_loaded_all<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|n| self.is_loaded(n.as_ref()))
    }

    pub fn is_unloaded(&self, name: &str) -> bool {
        position(&self.unloaded, name).is_some()
    }

    pub fn is_broken(&self, name: &str) -> bool {
        position(&self.broken, name).is_some()
    }

    /// Known in any partition
    pub fn exists(&self, name: &str) -> bool {
        self.is_loaded(name) || self.is_unloaded(name) || self.is_broken(name)
    }

    /// Loaded plugins that list `name` among their required plugins, in load order
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.load_order
            .iter()
            .filter(|candidate| {
                self.plugins
                    .get(candidate.as_str())
                    .map(|p| p.info().requires(name))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    pub fn has_dependents(&self, name: &str) -> bool {
        !self.dependents(name).is_empty()
    }

    /// Categories holding at least one loaded plugin, sorted
    pub fn categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    /// Loaded plugin names in `category`, in load order
    pub fn plugins_in_category(&self, category: &str) -> Vec<String> {
        self.categories.get(category).cloned().unwrap_or_default()
    }

    /// Declare a category that may not have plugins yet
    pub fn add_category(&mut self, name: &str) {
        self.declared_categories.insert(name.to_string());
    }

    /// Declared categories together with populated ones, sorted
    pub fn known_categories(&self) -> Vec<String> {
        self.declared_categories
            .iter()
            .chain(self.categories.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // --- Partition bookkeeping ---

    /// Register a descriptor as unloaded
    pub fn add(&mut self, info: PluginInfo) -> Result<()> {
        if self.exists(&info.name) {
            return Err(PluginSystemError::DuplicatePlugin(info.name));
        }
        self.unloaded.push(info);
        Ok(())
    }

    /// Replace the unloaded list. Entries already loaded or broken, and
    /// repeated names, are skipped.
    pub fn set_unloaded_plugins(&mut self, plugins: Vec<PluginInfo>) {
        let mut accepted: Vec<PluginInfo> = Vec::with_capacity(plugins.len());
        for info in plugins {
            if self.is_loaded(&info.name) || self.is_broken(&info.name) || position(&accepted, &info.name).is_some() {
                log::warn!("Not marking plugin '{}' as unloaded: it is already known", info.name);
                continue;
            }
            accepted.push(info);
        }
        self.unloaded = accepted;
    }

    /// Replace the broken list. Entries already loaded or unloaded, and
    /// repeated names, are skipped.
    pub fn set_broken_plugins(&mut self, plugins: Vec<PluginInfo>) {
        let mut accepted: Vec<PluginInfo> = Vec::with_capacity(plugins.len());
        for info in plugins {
            if self.is_loaded(&info.name) || self.is_unloaded(&info.name) || position(&accepted, &info.name).is_some() {
                log::warn!("Not marking plugin '{}' as broken: it is already known", info.name);
                continue;
            }
            accepted.push(info);
        }
        self.broken = accepted;
    }

    fn move_to_broken(&mut self, info: PluginInfo) {
        take_named(&mut self.unloaded, &info.name);
        log::warn!("Plugin '{}' moved to the broken list", info.name);
        match position(&self.broken, &info.name) {
            Some(idx) => self.broken[idx] = info,
            None => self.broken.push(info),
        }
    }

    fn move_to_unloaded(&mut self, info: PluginInfo) {
        take_named(&mut self.broken, &info.name);
        match position(&self.unloaded, &info.name) {
            Some(idx) => self.unloaded[idx] = info,
            None => self.unloaded.push(info),
        }
    }

    fn insert_loaded(&mut self, plugin: Box<dyn Plugin>) {
        let name = plugin.info().name.clone();
        let category = plugin.info().category.clone();
        if !category.is_empty() {
            self.categories.entry(category).or_default().push(name.clone());
        }
        self.load_order.push(name.clone());
        self.plugins.insert(name, plugin);
    }

    fn remove_loaded(&mut self, name: &str) -> Option<Box<dyn Plugin>> {
        let plugin = self.plugins.remove(name)?;
        self.load_order.retain(|n| n != name);

        let category = &plugin.info().category;
        if let Some(members) = self.categories.get_mut(category) {
            members.retain(|n| n != name);
            if members.is_empty() {
                self.categories.remove(category);
            }
        }
        Some(plugin)
    }

    /// Shut down if started, drop its modules, then hand the plugin back to
    /// its engine
    fn release(&mut self, mut plugin: Box<dyn Plugin>) -> Result<()> {
        let shutdown = if plugin.is_started() { plugin.shutdown() } else { Ok(()) };
        self.modules.release(&plugin.info().name);

        let info = plugin.info();
        let engine = self.engines.make(&info.engine).ok_or_else(|| PluginSystemError::EngineNotFound {
            plugin: info.name.clone(),
            engine: info.engine.clone(),
        })?;
        engine.unload(plugin)?;
        shutdown
    }

    /// Move every loaded plugin that needs `name` to broken, dependents of
    /// dependents first
    fn break_dependents(&mut self, name: &str) {
        for dependent in self.dependents(name) {
            if !self.is_loaded(&dependent) {
                continue;
            }
            self.break_dependents(&dependent);

            if let Some(plugin) = self.remove_loaded(&dependent) {
                let info = plugin.info().clone();
                log::warn!(
                    "Plugin '{}' depends on '{}', which is going away",
                    dependent,
                    name
                );
                if let Err(e) = self.release(plugin) {
                    log::warn!("Error while releasing plugin '{}': {}", dependent, e);
                }
                self.move_to_broken(info);
            }
        }
    }

    /// Broken plugins that required `name` and now have every requirement
    /// loaded become unloaded again. They are not loaded automatically.
    fn update_dependents(&mut self, name: &str) {
        let ready: Vec<String> = self
            .broken
            .iter()
            .filter(|info| info.requires(name) && self.is_loaded_all(&info.required_plugins))
            .map(|info| info.name.clone())
            .collect();

        for plugin in ready {
            if let Some(info) = take_named(&mut self.broken, &plugin) {
                log::info!("Plugin '{}' can be loaded again", plugin);
                self.move_to_unloaded(info);
            }
        }
    }

    // --- Loading ---

    /// Load one plugin and start it if `start` is set.
    ///
    /// Any failure after the already-loaded check moves the descriptor to
    /// broken before the error is returned.
    pub fn load(&mut self, info: PluginInfo, start: bool) -> Result<()> {
        if self.is_loaded(&info.name) {
            return Err(PluginSystemError::AlreadyLoaded(info.name));
        }

        let missing: Vec<String> = info
            .required_plugins
            .iter()
            .filter(|required| !self.is_loaded(required))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let plugin = info.name.clone();
            self.move_to_broken(info);
            return Err(PluginSystemError::UnsatisfiedDependency { plugin, missing });
        }

        let Some(engine) = self.engines.make(&info.engine) else {
            let err = PluginSystemError::EngineNotFound {
                plugin: info.name.clone(),
                engine: info.engine.clone(),
            };
            self.move_to_broken(info);
            return Err(err);
        };

        let modules_before = self.modules.len();
        let mut plugin = match engine.load(&info, &mut self.modules) {
            Ok(plugin) => plugin,
            Err(e) => {
                self.modules.truncate(modules_before);
                let name = info.name.clone();
                self.move_to_broken(info);
                return Err(PluginSystemError::engine_load(name, e));
            }
        };
        self.modules.claim_from(modules_before, &info.name);

        let activated = self
            .modules
            .initialize_from(modules_before)
            .and_then(|()| if start { plugin.startup() } else { Ok(()) });
        if let Err(e) = activated {
            self.modules.truncate(modules_before);
            if let Err(unload_err) = engine.unload(plugin) {
                log::warn!("Error while unloading plugin '{}': {}", info.name, unload_err);
            }
            let name = info.name.clone();
            self.move_to_broken(info);
            return Err(PluginSystemError::engine_load(name, e));
        }

        let name = info.name.clone();
        take_named(&mut self.unloaded, &name);
        take_named(&mut self.broken, &name);
        self.insert_loaded(plugin);
        log::info!("Plugin '{}' loaded{}", name, if start { " and started" } else { "" });

        self.update_dependents(&name);
        Ok(())
    }

    /// Load a known descriptor by name
    pub fn load_by_name(&mut self, name: &str, start: bool) -> Result<()> {
        if self.is_loaded(name) {
            return Err(PluginSystemError::AlreadyLoaded(name.to_string()));
        }
        let info = self.plugin(name)?.clone();
        self.load(info, start)
    }

    /// Load a batch in dependency order.
    ///
    /// Individual failures do not stop the batch; they are collected and
    /// reported together as [`PluginSystemError::BatchLoad`]. A dependency
    /// cycle rejects the whole batch before anything is loaded: the plugins
    /// on the cycle become broken and other new descriptors become unloaded.
    pub fn load_batch(&mut self, plugins: Vec<PluginInfo>, start: bool) -> Result<()> {
        let order = match dependency::topological_order(&plugins) {
            Ok(order) => order,
            Err(DependencyError::CyclicDependency(cycle)) => {
                log::warn!("Refusing to load plugins with circular requirements: {}", cycle.join(", "));
                for info in plugins {
                    if self.is_loaded(&info.name) {
                        continue;
                    }
                    if cycle.contains(&info.name) {
                        self.move_to_broken(info);
                    } else if !self.exists(&info.name) {
                        self.unloaded.push(info);
                    }
                }
                return Err(DependencyError::CyclicDependency(cycle).into());
            }
        };

        let mut slots: Vec<Option<PluginInfo>> = plugins.into_iter().map(Some).collect();
        let mut failed = Vec::new();

        for idx in order {
            let Some(info) = slots[idx].take() else { continue };
            let name = info.name.clone();
            if let Err(e) = self.load(info, start) {
                log::warn!("Failed to load plugin '{}': {}", name, e);
                failed.push(name);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(PluginSystemError::BatchLoad { failed })
        }
    }

    /// Ask the finders (or a [`DefaultFinder`]) for descriptors. The first
    /// descriptor seen for a name wins.
    pub fn discover(&self) -> Result<Vec<PluginInfo>> {
        let mut found = Vec::new();
        if self.finders.is_empty() {
            DefaultFinder::new().get_plugins(&mut found)?;
        } else {
            for finder in &self.finders {
                finder.get_plugins(&mut found)?;
            }
        }

        let mut unique: Vec<PluginInfo> = Vec::with_capacity(found.len());
        for info in found {
            if position(&unique, &info.name).is_some() {
                log::warn!(
                    "Ignoring duplicate descriptor for plugin '{}' in {}",
                    info.name,
                    info.folder.display()
                );
                continue;
            }
            unique.push(info);
        }
        log::debug!("Discovered {} plugin descriptor(s)", unique.len());
        Ok(unique)
    }

    /// Unload everything, then load every known plugin.
    ///
    /// The descriptors come from the finders when the unloaded list is empty,
    /// otherwise the unloaded list is reused without touching the disk.
    pub fn load_all(&mut self, start: bool) -> Result<()> {
        self.unload_all()?;

        let candidates = if self.unloaded.is_empty() {
            self.discover()?
        } else {
            self.unloaded.clone()
        };
        self.load_batch(candidates, start)
    }

    // --- Unloading ---

    /// Unload a plugin, moving its loaded dependents to broken first.
    ///
    /// If the plugin's engine is no longer registered the plugin stays loaded.
    pub fn unload(&mut self, name: &str) -> Result<()> {
        let engine_key = match self.plugins.get(name) {
            Some(plugin) => plugin.info().engine.clone(),
            None => return Err(PluginSystemError::NotLoaded(name.to_string())),
        };

        self.break_dependents(name);

        if let Some(plugin) = self.plugins.get_mut(name) {
            if plugin.is_started() {
                plugin.shutdown()?;
            }
        }

        let engine = self.engines.make(&engine_key).ok_or_else(|| PluginSystemError::EngineNotFound {
            plugin: name.to_string(),
            engine: engine_key.clone(),
        })?;

        let plugin = self
            .remove_loaded(name)
            .ok_or_else(|| PluginSystemError::NotLoaded(name.to_string()))?;
        let info = plugin.info().clone();
        self.modules.release(name);

        if let Err(e) = engine.unload(plugin) {
            self.move_to_broken(info);
            return Err(e);
        }

        self.move_to_unloaded(info);
        log::info!("Plugin '{}' unloaded", name);
        Ok(())
    }

    /// Unload every loaded plugin, most recently loaded first. Keeps going
    /// after a failure and returns the first error.
    pub fn unload_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for name in self.load_order.clone().into_iter().rev() {
            if !self.is_loaded(&name) {
                continue;
            }
            if let Err(e) = self.unload(&name) {
                log::warn!("Failed to unload plugin '{}': {}", name, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Take a loaded plugin out of the registry without shutting it down.
    /// Its dependents move to broken; its descriptor is forgotten.
    pub fn detach(&mut self, name: &str) -> Result<Box<dyn Plugin>> {
        if !self.is_loaded(name) {
            return Err(PluginSystemError::NotLoaded(name.to_string()));
        }
        self.break_dependents(name);
        let plugin = self
            .remove_loaded(name)
            .ok_or_else(|| PluginSystemError::NotLoaded(name.to_string()))?;
        log::info!("Plugin '{}' detached", name);
        Ok(plugin)
    }

    /// Forget a plugin in any partition, releasing it if it is loaded
    pub fn remove(&mut self, name: &str) -> Result<()> {
        if self.is_loaded(name) {
            let plugin = self.detach(name)?;
            return self.release(plugin);
        }
        if take_named(&mut self.unloaded, name).is_some() || take_named(&mut self.broken, name).is_some() {
            log::info!("Plugin '{}' removed", name);
            return Ok(());
        }
        Err(PluginSystemError::NotFound(name.to_string()))
    }

    /// Unload everything and forget all descriptors
    pub fn clear(&mut self) -> Result<()> {
        let result = self.unload_all();

        // plugins whose engine disappeared cannot be unloaded; drop them
        for name in self.load_order.clone() {
            if let Some(plugin) = self.remove_loaded(&name) {
                log::warn!("Dropping plugin '{}' without its engine", name);
                self.modules.release(&name);
                drop(plugin);
            }
        }
        self.unloaded.clear();
        self.broken.clear();
        result
    }

    // --- Lifecycle ---

    /// Start a loaded plugin. Starting a started plugin does nothing.
    pub fn start(&mut self, name: &str) -> Result<()> {
        let plugin = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| PluginSystemError::NotLoaded(name.to_string()))?;
        if plugin.is_started() {
            return Ok(());
        }
        plugin.startup()?;
        log::info!("Plugin '{}' started", name);
        Ok(())
    }

    /// Stop a started plugin. Refused while a started plugin depends on it.
    pub fn stop(&mut self, name: &str) -> Result<()> {
        if !self.is_loaded(name) {
            return Err(PluginSystemError::NotLoaded(name.to_string()));
        }

        let started_dependents: Vec<String> = self
            .dependents(name)
            .into_iter()
            .filter(|d| self.plugins.get(d).map(|p| p.is_started()).unwrap_or(false))
            .collect();
        if !started_dependents.is_empty() {
            return Err(PluginSystemError::DependentsExist {
                plugin: name.to_string(),
                dependents: started_dependents,
            });
        }

        if let Some(plugin) = self.plugins.get_mut(name) {
            if plugin.is_started() {
                plugin.shutdown()?;
                log::info!("Plugin '{}' stopped", name);
            }
        }
        Ok(())
    }

    /// Shut down every started plugin, most recently loaded first. All
    /// plugins are attempted; failures are reported together.
    pub fn shutdown_all(&mut self) -> Result<()> {
        let mut failed = Vec::new();
        let mut messages = Vec::new();

        for name in self.load_order.iter().rev() {
            let Some(plugin) = self.plugins.get_mut(name) else { continue };
            if !plugin.is_started() {
                continue;
            }
            if let Err(e) = plugin.shutdown() {
                log::warn!("Failed to shut down plugin '{}': {}", name, e);
                failed.push(name.clone());
                messages.push(e.to_string());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(PluginSystemError::Shutdown {
                plugin: failed.join(", "),
                message: messages.join("; "),
            })
        }
    }
}
