//! Reading `.teplg` plugin descriptors.
//!
//! A descriptor is an XML document whose root element is `PluginInfo`:
//!
//! ```xml
//! <PluginInfo xmlns:xlink="http://www.w3.org/1999/xlink">
//!   <Name>te.da.ogr</Name>
//!   <Engine>native</Engine>
//!   <RequiredPlugins><PluginId>te.da.core</PluginId></RequiredPlugins>
//!   <Resources><Resource name="SharedLibraryName" xlink:href="terralib_ogr"/></Resources>
//! </PluginInfo>
//! ```
//!
//! `Name` and `Engine` are required, everything else is optional.
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::kernel::constants::DESCRIPTOR_ROOT;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::info::{PluginInfo, Provider};

// --- Intermediate structs for deserialization ---

#[derive(Deserialize, Debug, Default)]
struct RawLink {
    #[serde(rename = "@href", default)]
    href: Option<String>,
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct RawProvider {
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Site", default)]
    site: Option<String>,
    #[serde(rename = "Email", default)]
    email: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct RawPluginIds {
    #[serde(rename = "PluginId", default)]
    ids: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
struct RawCategoryIds {
    #[serde(rename = "CategoryId", default)]
    ids: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
struct RawModuleIds {
    #[serde(rename = "ModuleId", default)]
    ids: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct RawResource {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@href", default)]
    href: Option<String>,
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct RawResources {
    #[serde(rename = "Resource", default)]
    entries: Vec<RawResource>,
}

#[derive(Deserialize, Debug)]
struct RawParameter {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value", default)]
    value: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct RawParameters {
    #[serde(rename = "Parameter", default)]
    entries: Vec<RawParameter>,
}

#[derive(Deserialize, Debug)]
struct RawPluginInfo {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "DisplayName", default)]
    display_name: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Version", default)]
    version: Option<String>,
    #[serde(rename = "Release", default)]
    release: Option<String>,
    #[serde(rename = "Engine")]
    engine: String,
    #[serde(rename = "HostVersion", default)]
    host_version: Option<String>,
    #[serde(rename = "License", default)]
    license: Option<RawLink>,
    #[serde(rename = "Category", default)]
    category: Option<String>,
    #[serde(rename = "Site", default)]
    site: Option<RawLink>,
    #[serde(rename = "Provider", default)]
    provider: Option<RawProvider>,
    #[serde(rename = "RequiredPlugins", default)]
    required_plugins: Option<RawPluginIds>,
    #[serde(rename = "RequiredPluginCategory", default)]
    required_categories: Option<RawCategoryIds>,
    #[serde(rename = "RequiredModules", default)]
    required_modules: Option<RawModuleIds>,
    #[serde(rename = "Resources", default)]
    resources: Option<RawResources>,
    #[serde(rename = "Parameters", default)]
    parameters: Option<RawParameters>,
}

// --- End Intermediate structs ---

fn text(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn ids(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl RawPluginInfo {
    fn into_info(self, folder: PathBuf) -> PluginInfo {
        let license = self.license.unwrap_or_default();
        let provider = self.provider.unwrap_or_default();
        let display_name = text(self.display_name);
        let name = self.name.trim().to_string();

        PluginInfo {
            display_name: if display_name.is_empty() { name.clone() } else { display_name },
            name,
            description: text(self.description),
            version: text(self.version),
            release: text(self.release),
            engine: self.engine.trim().to_string(),
            host_version: text(self.host_version),
            license_description: text(license.text),
            license_url: text(license.href),
            category: text(self.category),
            site: text(self.site.and_then(|s| s.href.or(s.text))),
            provider: Provider {
                name: text(provider.name),
                site: text(provider.site),
                email: text(provider.email),
            },
            required_plugins: ids(self.required_plugins.unwrap_or_default().ids),
            required_plugin_categories: ids(self.required_categories.unwrap_or_default().ids),
            required_modules: ids(self.required_modules.unwrap_or_default().ids),
            resources: self
                .resources
                .unwrap_or_default()
                .entries
                .into_iter()
                .map(|r| (r.name.trim().to_string(), text(r.href.or(r.text))))
                .collect(),
            parameters: self
                .parameters
                .unwrap_or_default()
                .entries
                .into_iter()
                .map(|p| (p.name.trim().to_string(), text(p.value)))
                .collect(),
            folder,
        }
    }
}

fn parse_error(path: &Path, message: impl Into<String>) -> PluginSystemError {
    PluginSystemError::DescriptorParse {
        path: path.to_path_buf(),
        message: message.into(),
        source: None,
    }
}

/// Local name of the document's first element, if any
fn root_element(xml: &str) -> std::result::Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Parse descriptor text. `path` is used for error reporting and its parent
/// becomes the descriptor's `folder`.
pub fn parse_descriptor(xml: &str, path: &Path) -> Result<PluginInfo> {
    let root = root_element(xml).map_err(|e| PluginSystemError::DescriptorParse {
        path: path.to_path_buf(),
        message: "malformed XML".to_string(),
        source: Some(Box::new(e)),
    })?;
    match root.as_deref() {
        Some(DESCRIPTOR_ROOT) => {}
        Some(other) => {
            return Err(parse_error(
                path,
                format!("root element is '{}', expected '{}'", other, DESCRIPTOR_ROOT),
            ))
        }
        None => return Err(parse_error(path, "document has no root element")),
    }

    let raw: RawPluginInfo = quick_xml::de::from_str(xml).map_err(|e| PluginSystemError::DescriptorParse {
        path: path.to_path_buf(),
        message: "invalid plugin descriptor".to_string(),
        source: Some(Box::new(e)),
    })?;

    let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let info = raw.into_info(folder);

    if info.name.is_empty() {
        return Err(parse_error(path, "'Name' must not be empty"));
    }
    if info.engine.is_empty() {
        return Err(parse_error(path, "'Engine' must not be empty"));
    }
    Ok(info)
}

/// Read the descriptor at `path`
pub fn get_installed_plugin(path: &Path) -> Result<PluginInfo> {
    if !path.is_file() {
        return Err(PluginSystemError::InvalidPath {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }

    let xml = fs::read_to_string(path).map_err(|e| PluginSystemError::DescriptorParse {
        path: path.to_path_buf(),
        message: "could not read file".to_string(),
        source: Some(Box::new(e)),
    })?;

    let info = parse_descriptor(&xml, path)?;
    log::debug!("Read descriptor for plugin '{}' from {}", info.name, path.display());
    Ok(info)
}
