use crate::plugin_system::info::{PluginInfo, PluginInfoBuilder, Provider};

#[test]
fn test_new_defaults_display_name() {
    let info = PluginInfo::new("te.da.ogr", "native");
    assert_eq!(info.name, "te.da.ogr");
    assert_eq!(info.display_name, "te.da.ogr");
    assert_eq!(info.engine, "native");
    assert!(info.required_plugins.is_empty());
    assert_eq!(info.provider, Provider::default());
}

#[test]
fn test_equality_and_order_use_name_only() {
    let a = PluginInfoBuilder::new("a", "native").version("1.0").build();
    let a_other = PluginInfoBuilder::new("a", "builtin").version("2.0").category("X").build();
    let b = PluginInfo::new("b", "native");

    assert_eq!(a, a_other);
    assert_ne!(a, b);
    assert!(a < b);

    let mut sorted = vec![b.clone(), a.clone()];
    sorted.sort();
    assert_eq!(sorted[0].name, "a");
}

#[test]
fn test_library_name_prefers_resource() {
    let plain = PluginInfo::new("te.da.ogr", "native");
    assert_eq!(plain.library_name(), "te.da.ogr");

    let with_lib = PluginInfoBuilder::new("te.da.ogr", "native")
        .resource("SharedLibraryName", "terralib_ogr")
        .build();
    assert_eq!(with_lib.library_name(), "terralib_ogr");
}

#[test]
fn test_lookup_helpers() {
    let info = PluginInfoBuilder::new("p", "native")
        .requires("core")
        .requires_all(&["gdal", "ogr"])
        .parameter("threads", "4")
        .resource("icon", "p.png")
        .build();

    assert_eq!(info.required_plugins, vec!["core", "gdal", "ogr"]);
    assert!(info.requires("gdal"));
    assert!(!info.requires("p"));
    assert_eq!(info.parameter("threads"), Some("4"));
    assert_eq!(info.parameter("missing"), None);
    assert_eq!(info.resource("icon"), Some("p.png"));
}

#[test]
fn test_builder_sets_every_field() {
    let info = PluginInfoBuilder::new("p", "builtin")
        .display_name("Pretty")
        .description("does things")
        .version("5.1.0")
        .category("Data Access")
        .required_module("te.common")
        .folder("/opt/plugins/p")
        .provider("INPE", "http://www.dpi.inpe.br", "dev@example.com")
        .build();

    assert_eq!(info.display_name, "Pretty");
    assert_eq!(info.description, "does things");
    assert_eq!(info.version, "5.1.0");
    assert_eq!(info.category, "Data Access");
    assert_eq!(info.required_modules, vec!["te.common"]);
    assert_eq!(info.folder, std::path::PathBuf::from("/opt/plugins/p"));
    assert_eq!(info.provider.name, "INPE");
    assert_eq!(info.provider.email, "dev@example.com");
}

#[test]
fn test_display() {
    let versioned = PluginInfoBuilder::new("p", "native").version("1.2").build();
    assert_eq!(versioned.to_string(), "p 1.2 [native]");
    assert_eq!(PluginInfo::new("q", "builtin").to_string(), "q [builtin]");
}
