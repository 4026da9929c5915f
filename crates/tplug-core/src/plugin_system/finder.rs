use std::env;
use std::path::{Path, PathBuf};

use crate::kernel::constants::{DESCRIPTOR_EXTENSION, HOME_ENV_VAR, INSTALL_PREFIX, PLUGINS_SUBDIR};
use crate::plugin_system::descriptor::get_installed_plugin;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::info::PluginInfo;
use crate::utils::fs::list_files_with_extension;

/// Strategy for discovering plugin descriptors
pub trait PluginFinder: Send {
    /// Append every descriptor found to `plugins`.
    ///
    /// Fails with [`PluginSystemError::InvalidDirectory`] when a configured
    /// directory no longer exists.
    fn get_plugins(&self, plugins: &mut Vec<PluginInfo>) -> Result<()>;
}

/// Scans directories for `.teplg` files.
///
/// Only direct children are inspected and the extension is matched
/// case-insensitively. Without explicit directories the default search path
/// is used (see [`DefaultFinder::default_dirs`]).
#[derive(Debug, Clone, Default)]
pub struct DefaultFinder {
    dirs: Vec<PathBuf>,
}

impl DefaultFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory to scan. Registering the same directory twice is a no-op.
    pub fn add_plugins_dir<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(PluginSystemError::InvalidDirectory {
                path: path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !self.dirs.contains(&canonical) {
            self.dirs.push(canonical);
        }
        Ok(())
    }

    /// Directories registered with [`add_plugins_dir`](Self::add_plugins_dir)
    pub fn plugins_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Default search order, keeping only directories that exist:
    /// the working directory, `share/tplug/plugins` under it, the same
    /// under `$TPLUG_HOME`, and under the build-time install prefix.
    pub fn default_dirs() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(cwd) = env::current_dir() {
            candidates.push(cwd.join(PLUGINS_SUBDIR));
            candidates.insert(0, cwd);
        }
        if let Some(home) = env::var_os(HOME_ENV_VAR) {
            candidates.push(PathBuf::from(home).join(PLUGINS_SUBDIR));
        }
        if let Some(prefix) = INSTALL_PREFIX {
            candidates.push(Path::new(prefix).join(PLUGINS_SUBDIR));
        }

        let mut dirs: Vec<PathBuf> = Vec::new();
        for candidate in candidates {
            if candidate.is_dir() && !dirs.contains(&candidate) {
                dirs.push(candidate);
            }
        }
        dirs
    }

    fn scan_dir(dir: &Path, plugins: &mut Vec<PluginInfo>) -> Result<()> {
        let files = list_files_with_extension(dir, DESCRIPTOR_EXTENSION).map_err(|e| {
            PluginSystemError::InvalidDirectory {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        log::debug!("Found {} descriptor(s) in {}", files.len(), dir.display());
        for file in files {
            match get_installed_plugin(&file) {
                Ok(info) => plugins.push(info),
                Err(e) => log::warn!("Skipping plugin descriptor {}: {}", file.display(), e),
            }
        }
        Ok(())
    }
}

impl PluginFinder for DefaultFinder {
    fn get_plugins(&self, plugins: &mut Vec<PluginInfo>) -> Result<()> {
        if self.dirs.is_empty() {
            for dir in Self::default_dirs() {
                Self::scan_dir(&dir, plugins)?;
            }
            return Ok(());
        }

        for dir in &self.dirs {
            if !dir.is_dir() {
                return Err(PluginSystemError::InvalidDirectory {
                    path: dir.clone(),
                    reason: "directory no longer exists".to_string(),
                });
            }
            Self::scan_dir(dir, plugins)?;
        }
        Ok(())
    }
}

/// Finder over a fixed list of descriptors, for plugins the host knows about
/// without a file on disk
#[derive(Debug, Clone, Default)]
pub struct StaticFinder {
    plugins: Vec<PluginInfo>,
}

impl StaticFinder {
    pub fn new(plugins: Vec<PluginInfo>) -> Self {
        Self { plugins }
    }
}

impl PluginFinder for StaticFinder {
    fn get_plugins(&self, plugins: &mut Vec<PluginInfo>) -> Result<()> {
        plugins.extend(self.plugins.iter().cloned());
        Ok(())
    }
}
