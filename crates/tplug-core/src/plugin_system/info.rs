use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use crate::plugin_system::ffi::NATIVE_LIBRARY_RESOURCE;

/// Who ships a plugin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provider {
    pub name: String,
    pub site: String,
    pub email: String,
}

/// A `(name, value)` entry of a descriptor's resources or parameters
pub type NameValue = (String, String);

/// Describes one plugin: identity, how to load it and what it needs.
///
/// Two descriptors are equal, and ordered, by `name` alone.
#[derive(Debug, Clone, Default)]
pub struct PluginInfo {
    /// Unique identifier across the manager
    pub name: String,

    /// Human-readable name
    pub display_name: String,

    pub description: String,

    pub version: String,

    pub release: String,

    /// Key of the engine that loads this plugin (e.g. "native", "builtin")
    pub engine: String,

    /// Host version the plugin was built against. Informational only.
    pub host_version: String,

    pub license_description: String,

    pub license_url: String,

    /// Free-form grouping tag
    pub category: String,

    pub site: String,

    pub provider: Provider,

    /// Plugins that must be loaded first, in declaration order
    pub required_plugins: Vec<String>,

    pub required_plugin_categories: Vec<String>,

    pub required_modules: Vec<String>,

    pub resources: Vec<NameValue>,

    pub parameters: Vec<NameValue>,

    /// Directory the descriptor was read from
    pub folder: PathBuf,
}

impl PluginInfo {
    /// Create a descriptor with the two mandatory fields set
    pub fn new(name: &str, engine: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            engine: engine.to_string(),
            ..Default::default()
        }
    }

    /// Look up a resource value by name
    pub fn resource(&self, name: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Look up a parameter value by name
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Base name of the shared library a native engine should open
    pub fn library_name(&self) -> &str {
        self.resource(NATIVE_LIBRARY_RESOURCE).unwrap_or(&self.name)
    }

    /// Whether `other` appears in this plugin's required plugins
    pub fn requires(&self, other: &str) -> bool {
        self.required_plugins.iter().any(|r| r == other)
    }
}

impl PartialEq for PluginInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for PluginInfo {}

impl PartialOrd for PluginInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for PluginInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{} [{}]", self.name, self.engine)
        } else {
            write!(f, "{} {} [{}]", self.name, self.version, self.engine)
        }
    }
}

/// Builder for creating a plugin descriptor in code
pub struct PluginInfoBuilder {
    info: PluginInfo,
}

impl PluginInfoBuilder {
    /// Create a new builder
    pub fn new(name: &str, engine: &str) -> Self {
        Self {
            info: PluginInfo::new(name, engine),
        }
    }

    pub fn display_name(mut self, display_name: &str) -> Self {
        self.info.display_name = display_name.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.info.description = description.to_string();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.info.version = version.to_string();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.info.category = category.to_string();
        self
    }

    /// Add a required plugin
    pub fn requires(mut self, plugin: &str) -> Self {
        self.info.required_plugins.push(plugin.to_string());
        self
    }

    /// Add multiple required plugins
    pub fn requires_all(mut self, plugins: &[&str]) -> Self {
        for plugin in plugins {
            self.info.required_plugins.push(plugin.to_string());
        }
        self
    }

    pub fn required_module(mut self, module: &str) -> Self {
        self.info.required_modules.push(module.to_string());
        self
    }

    pub fn resource(mut self, name: &str, value: &str) -> Self {
        self.info.resources.push((name.to_string(), value.to_string()));
        self
    }

    pub fn parameter(mut self, name: &str, value: &str) -> Self {
        self.info.parameters.push((name.to_string(), value.to_string()));
        self
    }

    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.info.folder = folder.into();
        self
    }

    pub fn provider(mut self, name: &str, site: &str, email: &str) -> Self {
        self.info.provider = Provider {
            name: name.to_string(),
            site: site.to_string(),
            email: email.to_string(),
        };
        self
    }

    /// Build the descriptor
    pub fn build(self) -> PluginInfo {
        self.info
    }
}
