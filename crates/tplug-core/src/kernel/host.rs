use std::sync::Arc;

use tokio::sync::Mutex;

use crate::kernel::config::{HostConfig, PluginState};
use crate::kernel::error::Result;
use crate::plugin_system::finder::{DefaultFinder, StaticFinder};
use crate::plugin_system::info::PluginInfo;
use crate::plugin_system::registry::PluginRegistry;

/// Application-level owner of the plugin registry.
///
/// The registry itself is not synchronized; every access from the host goes
/// through the mutex held here.
pub struct PluginHost {
    registry: Arc<Mutex<PluginRegistry>>,
    config: HostConfig,
}

impl PluginHost {
    /// Host over a registry with the default engines
    pub fn new(config: HostConfig) -> Result<Self> {
        Self::with_registry(PluginRegistry::new(), config)
    }

    /// Host over a pre-configured registry (extra engines, builtin plugins).
    ///
    /// A directory finder is added for `config.plugin_dirs`; when
    /// `use_default_dirs` is off and no directory is given, nothing is
    /// discovered from disk.
    pub fn with_registry(mut registry: PluginRegistry, config: HostConfig) -> Result<Self> {
        if !config.plugin_dirs.is_empty() {
            let mut finder = DefaultFinder::new();
            for dir in &config.plugin_dirs {
                finder.add_plugins_dir(dir)?;
            }
            if config.use_default_dirs {
                for dir in DefaultFinder::default_dirs() {
                    finder.add_plugins_dir(dir)?;
                }
            }
            registry.add_finder(Box::new(finder));
        } else if config.use_default_dirs {
            registry.add_finder(Box::new(DefaultFinder::new()));
        } else {
            registry.add_finder(Box::new(StaticFinder::default()));
        }

        Ok(Self {
            registry: Arc::new(Mutex::new(registry)),
            config,
        })
    }

    /// Shared handle to the registry
    pub fn registry(&self) -> Arc<Mutex<PluginRegistry>> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub async fn load_all(&self) -> Result<()> {
        let mut registry = self.registry.lock().await;
        registry.load_all(self.config.auto_start)?;
        Ok(())
    }

    pub async fn unload_all(&self) -> Result<()> {
        let mut registry = self.registry.lock().await;
        registry.unload_all()?;
        Ok(())
    }

    /// Bring plugins up at application start.
    ///
    /// Without persisted state everything discovered is loaded. With state,
    /// plugins listed as unloaded or broken are put back in those lists and
    /// the rest (enabled plugins and newly installed ones) are loaded as one
    /// batch.
    pub async fn initialize_plugins(&self) -> Result<()> {
        let state = match &self.config.state_file {
            Some(path) => PluginState::load(path)?,
            None => None,
        };

        let mut registry = self.registry.lock().await;
        let Some(state) = state else {
            log::info!("No persisted plugin state; loading every plugin");
            registry.load_all(self.config.auto_start)?;
            return Ok(());
        };

        registry.unload_all()?;
        let discovered = registry.discover()?;

        for name in state.enabled.iter().chain(&state.unloaded).chain(&state.broken) {
            if !discovered.iter().any(|info| &info.name == name) {
                log::warn!("Plugin '{}' from the saved state is no longer installed", name);
            }
        }

        let mut enabled: Vec<PluginInfo> = Vec::new();
        let mut unloaded: Vec<PluginInfo> = Vec::new();
        let mut broken: Vec<PluginInfo> = Vec::new();
        for info in discovered {
            if state.unloaded.contains(&info.name) {
                unloaded.push(info);
            } else if state.broken.contains(&info.name) {
                broken.push(info);
            } else {
                if !state.mentions(&info.name) {
                    log::info!("Plugin '{}' is new; enabling it", info.name);
                }
                enabled.push(info);
            }
        }

        registry.set_unloaded_plugins(unloaded);
        registry.set_broken_plugins(broken);
        registry.load_batch(enabled, self.config.auto_start)?;
        Ok(())
    }

    /// Names in each partition right now
    pub async fn snapshot(&self) -> PluginState {
        let registry = self.registry.lock().await;
        PluginState {
            enabled: registry.loaded_plugins().iter().map(|i| i.name.clone()).collect(),
            unloaded: registry.unloaded_plugins().iter().map(|i| i.name.clone()).collect(),
            broken: registry.broken_plugins().iter().map(|i| i.name.clone()).collect(),
        }
    }

    /// Write the current partitions to the configured state file. Does
    /// nothing when no state file is configured.
    pub async fn persist_state(&self) -> Result<()> {
        let Some(path) = self.config.state_file.clone() else {
            log::debug!("No state file configured; plugin state not saved");
            return Ok(());
        };
        let state = self.snapshot().await;
        state.save(&path)?;
        log::info!("Plugin state saved to {}", path.display());
        Ok(())
    }

    /// Shut down started plugins, unload everything, then finalize modules.
    /// Every step runs; the first error is returned.
    pub async fn shutdown(&self) -> Result<()> {
        let mut registry = self.registry.lock().await;

        let stopped = registry.shutdown_all();
        let unloaded = registry.unload_all();
        registry.modules_mut().finalize_all();

        stopped?;
        unloaded?;
        Ok(())
    }
}
