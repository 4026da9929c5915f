use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::finder::{PluginFinder, StaticFinder};
use crate::plugin_system::info::{PluginInfo, PluginInfoBuilder};
use crate::plugin_system::tests::mock::{
    assert_partitions, events_of, mock_info, mock_registry, MOCK_ENGINE,
};

fn loaded_names(registry: &crate::plugin_system::PluginRegistry) -> Vec<String> {
    registry.loaded_plugins().iter().map(|i| i.name.clone()).collect()
}

fn names(infos: &[PluginInfo]) -> Vec<String> {
    infos.iter().map(|i| i.name.clone()).collect()
}

#[test]
fn test_batch_loads_requirements_first() {
    let (mut registry, events) = mock_registry();

    let batch = vec![mock_info("B", &["A"]), mock_info("A", &[])];
    registry.load_batch(batch, false).expect("batch should load");

    assert_eq!(loaded_names(&registry), vec!["A", "B"]);
    assert_eq!(events_of(&events), vec!["load:A", "load:B"]);
    assert!(registry.get("A").map(|p| !p.is_started()).unwrap_or(false));
    assert_partitions(&registry);
}

#[test]
fn test_load_with_missing_requirement_goes_broken() {
    let (mut registry, events) = mock_registry();

    let result = registry.load(mock_info("B", &["A"]), false);
    match result {
        Err(PluginSystemError::UnsatisfiedDependency { plugin, missing }) => {
            assert_eq!(plugin, "B");
            assert_eq!(missing, vec!["A".to_string()]);
        }
        other => panic!("Expected UnsatisfiedDependency, got {:?}", other),
    }

    assert!(registry.is_broken("B"));
    assert!(!registry.is_loaded("B"));
    // the engine is never consulted
    assert!(events_of(&events).is_empty());
    assert_partitions(&registry);
}

#[test]
fn test_batch_reports_every_failure_at_the_end() {
    let (mut registry, _events) = mock_registry();

    let batch = vec![
        mock_info("B", &["missing"]),
        mock_info("A", &[]),
        PluginInfoBuilder::new("C", "no-such-engine").build(),
    ];
    let result = registry.load_batch(batch, true);

    match result {
        Err(PluginSystemError::BatchLoad { failed }) => assert_eq!(failed, vec!["B", "C"]),
        other => panic!("Expected BatchLoad, got {:?}", other),
    }
    assert!(registry.is_loaded("A"));
    assert!(registry.is_broken("B"));
    assert!(registry.is_broken("C"));
    assert_partitions(&registry);
}

#[test]
fn test_unload_cascades_dependents_to_broken() {
    let (mut registry, events) = mock_registry();
    registry
        .load_batch(vec![mock_info("A", &[]), mock_info("B", &["A"])], true)
        .unwrap();

    registry.unload("A").expect("unload should succeed");

    assert!(registry.is_unloaded("A"));
    assert!(registry.is_broken("B"));
    assert!(registry.loaded_plugins().is_empty());
    assert_eq!(
        events_of(&events),
        vec![
            "load:A",
            "startup:A",
            "load:B",
            "startup:B",
            "shutdown:B",
            "unload:B",
            "shutdown:A",
            "unload:A",
        ]
    );
    assert_partitions(&registry);
}

#[test]
fn test_cascade_is_transitive() {
    let (mut registry, _events) = mock_registry();
    registry
        .load_batch(
            vec![mock_info("A", &[]), mock_info("B", &["A"]), mock_info("C", &["B"]), mock_info("D", &[])],
            false,
        )
        .unwrap();

    registry.unload("A").unwrap();

    assert!(registry.is_broken("B"));
    assert!(registry.is_broken("C"));
    assert!(registry.is_loaded("D"));
    assert_partitions(&registry);
}

#[test]
fn test_cycle_rejects_whole_batch() {
    let (mut registry, events) = mock_registry();

    let batch = vec![mock_info("A", &["B"]), mock_info("B", &["A"]), mock_info("C", &[])];
    let result = registry.load_batch(batch, false);

    match result {
        Err(PluginSystemError::DependencyResolution(DependencyError::CyclicDependency(cycle))) => {
            assert_eq!(cycle, vec!["A", "B"]);
        }
        other => panic!("Expected CyclicDependency, got {:?}", other),
    }
    assert!(registry.loaded_plugins().is_empty());
    assert!(events_of(&events).is_empty());
    assert!(registry.is_broken("A"));
    assert!(registry.is_broken("B"));
    assert!(registry.is_unloaded("C"));
    assert_partitions(&registry);
}

#[test]
fn test_category_pruned_with_last_plugin() {
    let (mut registry, _events) = mock_registry();
    let a = PluginInfoBuilder::new("A", MOCK_ENGINE).category("Data Access").build();
    let b = PluginInfoBuilder::new("B", MOCK_ENGINE).category("Data Access").build();
    let c = PluginInfoBuilder::new("C", MOCK_ENGINE).category("Tools").build();
    registry.load_batch(vec![a, b, c], false).unwrap();

    assert_eq!(registry.categories(), vec!["Data Access", "Tools"]);
    assert_eq!(registry.plugins_in_category("Data Access"), vec!["A", "B"]);

    registry.unload("A").unwrap();
    assert_eq!(registry.categories(), vec!["Data Access", "Tools"]);

    registry.unload("B").unwrap();
    assert_eq!(registry.categories(), vec!["Tools"]);
    assert!(registry.plugins_in_category("Data Access").is_empty());
    assert_partitions(&registry);
}

#[test]
fn test_declared_categories_are_not_indexed() {
    let (mut registry, _events) = mock_registry();
    registry.add_category("Empty");
    registry
        .load(PluginInfoBuilder::new("A", MOCK_ENGINE).category("Tools").build(), false)
        .unwrap();

    assert_eq!(registry.categories(), vec!["Tools"]);
    assert_eq!(registry.known_categories(), vec!["Empty", "Tools"]);
}

#[test]
fn test_load_all_then_unload_all_round_trip() {
    let (mut registry, _events) = mock_registry();
    let descriptors = vec![
        PluginInfoBuilder::new("A", MOCK_ENGINE).category("Core").build(),
        mock_info("B", &["A"]),
        mock_info("C", &[]),
    ];
    registry.add_finder(Box::new(StaticFinder::new(descriptors)));

    registry.load_all(false).expect("load_all should succeed");
    assert_eq!(loaded_names(&registry).len(), 3);
    assert!(registry.unloaded_plugins().is_empty());

    registry.unload_all().unwrap();

    let mut unloaded = names(registry.unloaded_plugins());
    unloaded.sort();
    assert_eq!(unloaded, vec!["A", "B", "C"]);
    assert!(registry.loaded_plugins().is_empty());
    assert!(registry.categories().is_empty());
    assert!(registry.broken_plugins().is_empty());
    assert_partitions(&registry);
}

struct CountingFinder {
    calls: Arc<AtomicUsize>,
    plugins: Vec<PluginInfo>,
}

impl PluginFinder for CountingFinder {
    fn get_plugins(&self, plugins: &mut Vec<PluginInfo>) -> crate::plugin_system::error::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        plugins.extend(self.plugins.iter().cloned());
        Ok(())
    }
}

#[test]
fn test_load_all_reuses_unloaded_list() {
    let (mut registry, _events) = mock_registry();
    let calls = Arc::new(AtomicUsize::new(0));
    registry.add_finder(Box::new(CountingFinder {
        calls: Arc::clone(&calls),
        plugins: vec![mock_info("A", &[]), mock_info("B", &["A"])],
    }));

    registry.load_all(true).unwrap();
    registry.load_all(true).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(loaded_names(&registry), vec!["A", "B"]);
    assert_partitions(&registry);
}

#[test]
fn test_discover_keeps_first_duplicate() {
    let (mut registry, _events) = mock_registry();
    let first = PluginInfoBuilder::new("A", MOCK_ENGINE).version("1.0").build();
    let second = PluginInfoBuilder::new("A", MOCK_ENGINE).version("2.0").build();
    registry.add_finder(Box::new(StaticFinder::new(vec![first, second])));

    let found = registry.discover().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].version, "1.0");
}

#[test]
fn test_broken_plugin_promoted_when_dependency_loads() {
    let (mut registry, _events) = mock_registry();

    assert!(registry.load(mock_info("B", &["A"]), false).is_err());
    assert!(registry.is_broken("B"));

    registry.load(mock_info("A", &[]), false).unwrap();

    // promoted, not loaded
    assert!(registry.is_unloaded("B"));
    assert!(!registry.is_loaded("B"));

    registry.load_by_name("B", false).unwrap();
    assert!(registry.is_loaded("B"));
    assert_partitions(&registry);
}

#[test]
fn test_unrelated_broken_plugin_stays_broken() {
    let (mut registry, _events) = mock_registry();
    let bad_engine = PluginInfoBuilder::new("X", "no-such-engine").build();
    assert!(registry.load(bad_engine, false).is_err());

    registry.load(mock_info("A", &[]), false).unwrap();
    assert!(registry.is_broken("X"));
}

#[test]
fn test_missing_engine_goes_broken() {
    let (mut registry, _events) = mock_registry();
    let info = PluginInfoBuilder::new("X", "no-such-engine").build();

    match registry.load(info, false) {
        Err(PluginSystemError::EngineNotFound { plugin, engine }) => {
            assert_eq!(plugin, "X");
            assert_eq!(engine, "no-such-engine");
        }
        other => panic!("Expected EngineNotFound, got {:?}", other),
    }
    assert!(registry.is_broken("X"));
}

#[test]
fn test_engine_failure_is_wrapped_and_recorded() {
    let (mut registry, _events) = mock_registry();
    let info = PluginInfoBuilder::new("X", MOCK_ENGINE).parameter("fail_load", "1").build();

    match registry.load(info, false) {
        Err(PluginSystemError::EngineLoad { plugin, source }) => {
            assert_eq!(plugin, "X");
            assert!(matches!(*source, PluginSystemError::Ffi { .. }));
        }
        other => panic!("Expected EngineLoad, got {:?}", other),
    }
    assert!(registry.is_broken("X"));
    assert_partitions(&registry);
}

#[test]
fn test_startup_failure_unloads_and_breaks() {
    let (mut registry, events) = mock_registry();
    let info = PluginInfoBuilder::new("X", MOCK_ENGINE).parameter("fail_startup", "1").build();

    let err = registry.load(info, true).unwrap_err();
    assert!(matches!(err, PluginSystemError::EngineLoad { .. }));

    assert!(!registry.is_loaded("X"));
    assert!(registry.is_broken("X"));
    assert_eq!(events_of(&events), vec!["load:X", "startup:X", "unload:X"]);
}

#[test]
fn test_load_twice_is_rejected() {
    let (mut registry, _events) = mock_registry();
    registry.load(mock_info("A", &[]), false).unwrap();

    let err = registry.load(mock_info("A", &[]), false).unwrap_err();
    assert!(matches!(err, PluginSystemError::AlreadyLoaded(ref n) if n == "A"));
    assert!(registry.is_loaded("A"));
    assert_partitions(&registry);
}

#[test]
fn test_loading_unloaded_descriptor_moves_it() {
    let (mut registry, _events) = mock_registry();
    registry.add(mock_info("A", &[])).unwrap();
    assert!(registry.is_unloaded("A"));

    registry.load_by_name("A", false).unwrap();
    assert!(registry.is_loaded("A"));
    assert!(!registry.is_unloaded("A"));
    assert_partitions(&registry);
}

#[test]
fn test_add_rejects_known_names() {
    let (mut registry, _events) = mock_registry();
    registry.add(mock_info("A", &[])).unwrap();
    registry.load(mock_info("B", &[]), false).unwrap();

    assert!(matches!(
        registry.add(mock_info("A", &[])),
        Err(PluginSystemError::DuplicatePlugin(_))
    ));
    assert!(matches!(
        registry.add(mock_info("B", &[])),
        Err(PluginSystemError::DuplicatePlugin(_))
    ));
}

#[test]
fn test_load_by_name_unknown() {
    let (mut registry, _events) = mock_registry();
    assert!(matches!(
        registry.load_by_name("ghost", false),
        Err(PluginSystemError::NotFound(_))
    ));
}

#[test]
fn test_detach_hands_over_without_shutdown() {
    let (mut registry, events) = mock_registry();
    registry
        .load_batch(vec![mock_info("A", &[]), mock_info("B", &["A"])], true)
        .unwrap();

    let plugin = registry.detach("A").expect("detach should succeed");
    assert_eq!(plugin.info().name, "A");
    assert!(plugin.is_started());

    assert!(!registry.exists("A"));
    assert!(registry.is_broken("B"));
    assert!(!events_of(&events).contains(&"shutdown:A".to_string()));
    assert_partitions(&registry);
}

#[test]
fn test_remove_from_each_partition() {
    let (mut registry, events) = mock_registry();
    registry.load(mock_info("A", &[]), true).unwrap();
    registry.add(mock_info("U", &[])).unwrap();
    let _ = registry.load(mock_info("X", &["ghost"]), false);

    registry.remove("A").unwrap();
    registry.remove("U").unwrap();
    registry.remove("X").unwrap();

    assert_eq!(registry.num_plugins(), 0);
    assert!(events_of(&events).ends_with(&["shutdown:A".to_string(), "unload:A".to_string()]));
    assert!(matches!(registry.remove("A"), Err(PluginSystemError::NotFound(_))));
}

#[test]
fn test_unload_unknown_plugin() {
    let (mut registry, _events) = mock_registry();
    registry.add(mock_info("A", &[])).unwrap();
    assert!(matches!(registry.unload("A"), Err(PluginSystemError::NotLoaded(_))));
    assert!(matches!(registry.detach("A"), Err(PluginSystemError::NotLoaded(_))));
}

#[test]
fn test_unload_without_engine_keeps_plugin_loaded() {
    let (mut registry, _events) = mock_registry();
    registry.load(mock_info("A", &[]), false).unwrap();
    registry.engines_mut().unregister(MOCK_ENGINE);

    assert!(matches!(
        registry.unload("A"),
        Err(PluginSystemError::EngineNotFound { .. })
    ));
    assert!(registry.is_loaded("A"));
    assert_partitions(&registry);
}

#[test]
fn test_engine_unload_failure_goes_broken() {
    let (mut registry, _events) = mock_registry();
    let info = PluginInfoBuilder::new("A", MOCK_ENGINE).parameter("fail_unload", "1").build();
    registry.load(info, false).unwrap();

    assert!(registry.unload("A").is_err());
    assert!(registry.is_broken("A"));
    assert_partitions(&registry);
}

#[test]
fn test_set_lists_skip_conflicting_names() {
    let (mut registry, _events) = mock_registry();
    registry.load(mock_info("A", &[]), false).unwrap();

    registry.set_broken_plugins(vec![mock_info("B", &[])]);
    registry.set_unloaded_plugins(vec![
        mock_info("A", &[]),
        mock_info("B", &[]),
        mock_info("C", &[]),
        mock_info("C", &[]),
    ]);

    assert_eq!(names(registry.unloaded_plugins()), vec!["C"]);
    assert_eq!(names(registry.broken_plugins()), vec!["B"]);
    assert_partitions(&registry);
}

#[test]
fn test_queries_cover_all_partitions() {
    let (mut registry, _events) = mock_registry();
    registry.load(mock_info("A", &[]), false).unwrap();
    registry.add(mock_info("U", &[])).unwrap();
    let _ = registry.load(mock_info("X", &["ghost"]), false);

    assert_eq!(registry.plugins(), vec!["A", "U", "X"]);
    assert_eq!(registry.num_plugins(), 3);
    assert_eq!(registry.plugin("U").unwrap().name, "U");
    assert_eq!(registry.plugin("X").unwrap().required_plugins, vec!["ghost"]);
    assert!(matches!(registry.plugin("ghost"), Err(PluginSystemError::NotFound(_))));
    assert!(registry.is_loaded_all(&["A"]));
    assert!(!registry.is_loaded_all(&["A", "U"]));
    assert!(registry.is_loaded_all::<&str>(&[]));
}

#[test]
fn test_dependents_only_consider_loaded_plugins() {
    let (mut registry, _events) = mock_registry();
    registry
        .load_batch(vec![mock_info("A", &[]), mock_info("B", &["A"])], false)
        .unwrap();
    registry.add(mock_info("C", &["A"])).unwrap();

    assert_eq!(registry.dependents("A"), vec!["B"]);
    assert!(registry.has_dependents("A"));
    assert!(!registry.has_dependents("B"));
}

#[test]
fn test_clear_forgets_everything() {
    let (mut registry, _events) = mock_registry();
    registry.load(mock_info("A", &[]), true).unwrap();
    registry.add(mock_info("U", &[])).unwrap();
    let _ = registry.load(mock_info("X", &["ghost"]), false);

    registry.clear().unwrap();
    assert_eq!(registry.num_plugins(), 0);
    assert!(registry.categories().is_empty());
}
