use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::finder::StaticFinder;
use crate::plugin_system::info::PluginInfoBuilder;
use crate::plugin_system::tests::mock::{
    assert_partitions, events_of, mock_info, mock_registry, MOCK_ENGINE,
};

#[test]
fn test_start_and_stop() {
    let (mut registry, events) = mock_registry();
    registry.load(mock_info("A", &[]), false).unwrap();
    assert!(!registry.get("A").unwrap().is_started());

    registry.start("A").unwrap();
    registry.start("A").unwrap();
    assert!(registry.get("A").unwrap().is_started());

    registry.stop("A").unwrap();
    registry.stop("A").unwrap();
    assert!(!registry.get("A").unwrap().is_started());

    assert_eq!(events_of(&events), vec!["load:A", "startup:A", "shutdown:A"]);
}

#[test]
fn test_start_requires_loaded_plugin() {
    let (mut registry, _events) = mock_registry();
    registry.add(mock_info("A", &[])).unwrap();

    assert!(matches!(registry.start("A"), Err(PluginSystemError::NotLoaded(_))));
    assert!(matches!(registry.stop("A"), Err(PluginSystemError::NotLoaded(_))));
}

#[test]
fn test_stop_refused_while_dependent_started() {
    let (mut registry, _events) = mock_registry();
    registry
        .load_batch(vec![mock_info("A", &[]), mock_info("B", &["A"])], true)
        .unwrap();

    match registry.stop("A") {
        Err(PluginSystemError::DependentsExist { plugin, dependents }) => {
            assert_eq!(plugin, "A");
            assert_eq!(dependents, vec!["B"]);
        }
        other => panic!("Expected DependentsExist, got {:?}", other),
    }
    assert!(registry.get("A").unwrap().is_started());

    registry.stop("B").unwrap();
    registry.stop("A").unwrap();
    assert!(!registry.get("A").unwrap().is_started());
}

#[test]
fn test_startup_failure_on_start_keeps_plugin_loaded() {
    let (mut registry, _events) = mock_registry();
    let info = PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("fail_startup", "1").build();
    registry.load(info, false).unwrap();

    assert!(matches!(registry.start("A"), Err(PluginSystemError::Startup { .. })));
    assert!(registry.is_loaded("A"));
    assert!(!registry.get("A").unwrap().is_started());
}

#[test]
fn test_shutdown_all_runs_in_reverse_load_order() {
    let (mut registry, events) = mock_registry();
    registry
        .load_batch(
            vec![mock_info("C", &["B"]), mock_info("B", &["A"]), mock_info("A", &[])],
            true,
        )
        .unwrap();

    registry.shutdown_all().unwrap();

    let shutdowns: Vec<String> = events_of(&events)
        .into_iter()
        .filter(|e| e.starts_with("shutdown:"))
        .collect();
    assert_eq!(shutdowns, vec!["shutdown:C", "shutdown:B", "shutdown:A"]);
    // still loaded, just stopped
    assert_eq!(registry.loaded_plugins().len(), 3);
}

#[test]
fn test_shutdown_all_reports_every_failure() {
    let (mut registry, events) = mock_registry();
    let a = PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("fail_shutdown", "1").build();
    let b = mock_info("B", &[]);
    let c = PluginInfoBuilder::new("C", MOCK_ENGINE).parameter("fail_shutdown", "1").build();
    registry.load_batch(vec![a, b, c], true).unwrap();

    match registry.shutdown_all() {
        Err(PluginSystemError::Shutdown { plugin, message }) => {
            assert_eq!(plugin, "C, A");
            assert!(message.contains("scripted failure"));
        }
        other => panic!("Expected Shutdown, got {:?}", other),
    }
    // B was still attempted
    assert!(events_of(&events).contains(&"shutdown:B".to_string()));
}

#[test]
fn test_module_initializers_run_once_in_order() {
    let (mut registry, events) = mock_registry();
    let a = PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("modules", "m1,m2").build();
    let b = PluginInfoBuilder::new("B", MOCK_ENGINE)
        .requires("A")
        .parameter("modules", "m3")
        .build();
    registry.load_batch(vec![a, b], false).unwrap();

    assert_eq!(
        events_of(&events),
        vec!["load:A", "init:m1", "init:m2", "load:B", "init:m3"]
    );
    assert_eq!(registry.modules().names(), vec!["m1", "m2", "m3"]);
    assert!(registry.modules().is_initialized("m2"));

    registry.modules_mut().initialize_from(0).unwrap();
    assert_eq!(events_of(&events).len(), 5);
}

#[test]
fn test_duplicate_module_breaks_second_plugin() {
    let (mut registry, _events) = mock_registry();
    let a = PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("modules", "shared").build();
    let b = PluginInfoBuilder::new("B", MOCK_ENGINE).parameter("modules", "shared").build();
    registry.load(a, false).unwrap();

    match registry.load(b, false) {
        Err(PluginSystemError::EngineLoad { source, .. }) => {
            assert!(matches!(*source, PluginSystemError::ModuleAlreadyRegistered(_)));
        }
        other => panic!("Expected EngineLoad, got {:?}", other),
    }
    assert!(registry.is_broken("B"));
    assert_eq!(registry.modules().len(), 1);
}

#[test]
fn test_modules_finalized_newest_first() {
    let (mut registry, events) = mock_registry();
    let a = PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("modules", "m1,m2").build();
    registry.load(a, false).unwrap();

    registry.modules_mut().finalize_all();
    registry.modules_mut().finalize_all();

    let finalized: Vec<String> = events_of(&events)
        .into_iter()
        .filter(|e| e.starts_with("finalize:"))
        .collect();
    assert_eq!(finalized, vec!["finalize:m2", "finalize:m1"]);
    assert!(!registry.modules().is_initialized("m1"));
}

#[test]
fn test_module_failure_breaks_plugin() {
    let (mut registry, events) = mock_registry();
    let info = PluginInfoBuilder::new("A", MOCK_ENGINE)
        .parameter("modules", "m1,m2,m3")
        .parameter("fail_module", "m2")
        .build();

    match registry.load(info, true) {
        Err(PluginSystemError::EngineLoad { plugin, source }) => {
            assert_eq!(plugin, "A");
            assert!(matches!(*source, PluginSystemError::ModuleInitialization { ref module, .. } if module == "m2"));
        }
        other => panic!("Expected EngineLoad, got {:?}", other),
    }

    assert!(registry.is_broken("A"));
    assert_eq!(
        events_of(&events),
        vec!["load:A", "init:m1", "init:m2", "finalize:m1", "unload:A"]
    );
    // nothing the failed load registered is left behind
    assert!(registry.modules().is_empty());
    assert_partitions(&registry);
}

#[test]
fn test_plugin_with_modules_can_be_reloaded() {
    let (mut registry, events) = mock_registry();
    let a = PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("modules", "m1,m2").build();
    registry.load(a, true).unwrap();
    assert_eq!(registry.modules().owner_of("m1"), Some("A"));

    registry.unload("A").unwrap();
    assert!(registry.modules().is_empty());
    assert!(registry.is_unloaded("A"));

    registry.load_by_name("A", true).expect("reload should succeed");
    assert!(registry.is_loaded("A"));
    assert!(registry.modules().is_initialized("m1"));
    assert!(registry.modules().is_initialized("m2"));
    assert_eq!(
        events_of(&events),
        vec![
            "load:A",
            "init:m1",
            "init:m2",
            "startup:A",
            "shutdown:A",
            "finalize:m2",
            "finalize:m1",
            "unload:A",
            "load:A",
            "init:m1",
            "init:m2",
            "startup:A",
        ]
    );
    assert_partitions(&registry);
}

#[test]
fn test_load_all_restarts_plugins_with_modules() {
    let (mut registry, _events) = mock_registry();
    registry.add_finder(Box::new(StaticFinder::new(vec![
        PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("modules", "a.module").build(),
        PluginInfoBuilder::new("B", MOCK_ENGINE)
            .requires("A")
            .parameter("modules", "b.module")
            .build(),
    ])));

    registry.load_all(true).expect("first load_all should succeed");
    registry.load_all(true).expect("second load_all should succeed");

    assert!(registry.is_loaded_all(&["A", "B"]));
    assert!(registry.broken_plugins().is_empty());
    assert_eq!(registry.modules().names(), vec!["a.module", "b.module"]);
    assert_partitions(&registry);
}

#[test]
fn test_cascade_releases_dependent_modules() {
    let (mut registry, _events) = mock_registry();
    let a = PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("modules", "a.module").build();
    let b = PluginInfoBuilder::new("B", MOCK_ENGINE)
        .requires("A")
        .parameter("modules", "b.module")
        .build();
    registry.load_batch(vec![a, b], false).unwrap();

    registry.unload("A").unwrap();

    assert!(registry.is_broken("B"));
    assert!(registry.modules().is_empty());
}

#[test]
fn test_detached_plugin_keeps_its_modules() {
    let (mut registry, _events) = mock_registry();
    let a = PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("modules", "a.module").build();
    registry.load(a, false).unwrap();

    let _plugin = registry.detach("A").unwrap();

    assert!(registry.modules().is_initialized("a.module"));
    assert_eq!(registry.modules().owner_of("a.module"), Some("A"));
}
