//! Tests for build export/import and persistence through the services

use std::collections::BTreeMap;
use std::sync::Arc;

use tempfile::TempDir;

use skilltree::application::ApplicationError;
use skilltree::config::Settings;
use skilltree::domain::{BuildPayload, Dataset, Point, RuleEngine};
use skilltree::infrastructure::di::ServiceContainer;
use skilltree::infrastructure::traits::RealFileSystem;
use skilltree::util::testing::{init_test_setup, sample_dataset};

const FIXTURE: &str = include_str!("resources/skills.json");

/// Container over a temp dir holding the fixture dataset.
fn container(temp: &TempDir) -> ServiceContainer {
    init_test_setup();
    let dataset = temp.path().join("skills.json");
    std::fs::write(&dataset, FIXTURE).expect("write dataset");
    let settings = Settings {
        dataset,
        build_file: temp.path().join("builds/current.json"),
        ..Settings::default()
    };
    ServiceContainer::with_deps(settings, Arc::new(RealFileSystem))
}

#[test]
fn given_selection_when_exporting_and_importing_then_selection_is_reproduced() {
    // Arrange
    let mut engine = RuleEngine::new(&sample_dataset()).unwrap();
    for id in ["ten", "zetsu", "ren", "gyo", "aura"] {
        engine.buy(id).unwrap();
    }
    engine.buy_stack("aura").unwrap();
    let payload = engine.export_build();

    // Act
    let mut restored = RuleEngine::new(&sample_dataset()).unwrap();
    let report = restored.import_build(&payload);

    // Assert
    assert!(report.is_complete());
    assert_eq!(restored.state(), engine.state());
    assert_eq!(restored.stack_level("aura"), 2);
}

#[test]
fn given_unordered_active_list_when_importing_then_fixed_point_resolves_dependencies() {
    let mut engine = RuleEngine::new(&sample_dataset()).unwrap();
    let payload = BuildPayload {
        points_max: Some(60),
        active: ["gyo", "hatsu", "ren", "zetsu", "ten"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ..BuildPayload::default()
    };

    let report = engine.import_build(&payload);

    assert!(report.dropped.is_empty());
    assert_eq!(engine.active().len(), 5);
    assert_eq!(engine.points_spent(), 4 + 3 + 3 + 5 + 2);
}

#[test]
fn given_unsatisfiable_ids_when_importing_then_dropped_and_reported() {
    let mut engine = RuleEngine::new(&sample_dataset()).unwrap();
    let payload = BuildPayload {
        points_max: Some(8),
        active: vec![
            "ten".into(),
            "hatsu".into(),
            "ghost".into(),
            "zetsu".into(),
        ],
        stat_totals: BTreeMap::from([("aura".to_string(), 999.0)]),
        ..BuildPayload::default()
    };

    let report = engine.import_build(&payload);

    // ten + zetsu = 7; hatsu misses ren, ghost is unknown
    assert_eq!(report.restored, vec!["ten".to_string(), "zetsu".to_string()]);
    assert_eq!(report.dropped, vec!["ghost".to_string(), "hatsu".to_string()]);
    assert_eq!(engine.points_spent(), 7);
    assert_eq!(engine.stat_totals().get("aura"), Some(&2.0));
}

#[test]
fn given_stack_levels_over_budget_when_importing_then_shortfall_reported() {
    let mut engine = RuleEngine::new(&sample_dataset()).unwrap();
    let payload = BuildPayload {
        points_max: Some(10),
        active: vec!["ten".into(), "aura".into()],
        stacks: BTreeMap::from([("aura".to_string(), 3), ("ten".to_string(), 2)]),
        ..BuildPayload::default()
    };

    let report = engine.import_build(&payload);

    // 4 + 2 + 3 = 9, level 3 would cost 4 more
    assert_eq!(engine.stack_level("aura"), 2);
    assert_eq!(report.stack_shortfall.get("aura"), Some(&1));
    assert!(!report.stack_shortfall.contains_key("ten"));
}

#[test]
fn given_saved_build_when_reopening_session_then_state_and_positions_survive() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let services = container(&temp);
    let mut session = services.build_service.open().unwrap();
    session.engine.buy("ten").unwrap();
    session.engine.buy_stack("en_aura").unwrap();
    session.engine.buy_stack("en_aura").unwrap();
    session.positions = Some(BTreeMap::from([(
        "ten".to_string(),
        Point { x: 10.0, y: 20.0 },
    )]));

    // Act
    services.build_service.save(&session).unwrap();
    let reopened = services.build_service.open().unwrap();

    // Assert
    assert!(temp.path().join("builds/current.json").is_file());
    assert_eq!(reopened.engine.state(), session.engine.state());
    let positions = services.layout_service.positions(&reopened, 1080.0, 630.0);
    assert_eq!(positions["ten"], Point { x: 10.0, y: 20.0 });
}

#[test]
fn given_exported_file_when_importing_into_fresh_session_then_matches() {
    let temp = TempDir::new().unwrap();
    let services = container(&temp);
    let mut session = services.build_service.open().unwrap();
    for id in ["ten", "ren", "ren_fortalecido", "meditacao"] {
        session.engine.buy(id).unwrap();
    }
    let export_path = temp.path().join("export.json");
    services
        .build_service
        .write_payload(&export_path, &session.to_payload())
        .unwrap();

    let mut fresh = services.build_service.open().unwrap();
    let report = services
        .build_service
        .import_file(&mut fresh, &export_path)
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(fresh.engine.export_build(), session.engine.export_build());
    assert_eq!(fresh.engine.stat_totals().get("forca"), Some(&1.0));
    assert!(!fresh.engine.stat_totals().contains_key("foco"));
}

#[test]
fn given_missing_dataset_when_opening_then_dataset_not_found() {
    let temp = TempDir::new().unwrap();
    let settings = Settings {
        dataset: temp.path().join("missing.json"),
        ..Settings::default()
    };
    let services = ServiceContainer::with_deps(settings, Arc::new(RealFileSystem));

    let err = services.build_service.open().unwrap_err();

    assert!(matches!(err, ApplicationError::DatasetNotFound(_)));
}

#[test]
fn given_corrupt_build_file_when_opening_then_parse_error() {
    let temp = TempDir::new().unwrap();
    let services = container(&temp);
    std::fs::create_dir_all(temp.path().join("builds")).unwrap();
    std::fs::write(temp.path().join("builds/current.json"), "{ not json").unwrap();

    let err = services.build_service.open().unwrap_err();

    assert!(err.to_string().contains("build"));
}

#[test]
fn given_duplicate_ids_in_dataset_when_opening_then_rule_error() {
    let temp = TempDir::new().unwrap();
    let dataset = temp.path().join("dup.json");
    let nodes = r#"{"nodes": [{"id": "a"}, {"id": "a"}]}"#;
    std::fs::write(&dataset, nodes).unwrap();
    assert!(Dataset::from_json(nodes).is_ok());
    let settings = Settings {
        dataset,
        ..Settings::default()
    };
    let services = ServiceContainer::with_deps(settings, Arc::new(RealFileSystem));

    let err = services.dataset_service.load_engine().unwrap_err();

    assert!(matches!(err, ApplicationError::Rule(_)));
}
