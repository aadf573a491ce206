//! Tests for the deterministic layout engine

use std::collections::BTreeSet;

use rstest::rstest;

use skilltree::domain::layout::{self, Band, CATCH_ALL_GROUP};
use skilltree::domain::{Dataset, Node};
use skilltree::util::testing::{init_test_setup, sample_dataset};

fn fixture_nodes() -> Vec<Node> {
    Dataset::from_json(include_str!("resources/skills.json"))
        .unwrap()
        .nodes
}

#[rstest]
#[case(1080.0, 630.0)]
#[case(400.0, 300.0)]
#[case(0.0, 0.0)]
fn given_same_input_when_computing_twice_then_identical(#[case] width: f64, #[case] height: f64) {
    init_test_setup();
    let nodes = fixture_nodes();

    let first = layout::compute(&nodes, width, height);
    let second = layout::compute(&nodes, width, height);

    assert_eq!(first, second);
}

#[test]
fn given_nodes_when_computing_then_every_id_is_placed_once() {
    let nodes = fixture_nodes();

    let positions = layout::compute(&nodes, 1080.0, 630.0);

    let ids: BTreeSet<_> = nodes.iter().map(|n| n.id.clone()).collect();
    let placed: BTreeSet<_> = positions.keys().cloned().collect();
    assert_eq!(ids, placed);
    assert!(positions.values().all(|p| p.x.is_finite() && p.y.is_finite()));
}

#[test]
fn given_both_bands_when_computing_then_advanced_rows_sit_below_basic_rows() {
    let dataset = sample_dataset();
    let positions = layout::compute(&dataset.nodes, 1080.0, 630.0);

    let y_of = |band: Band| {
        dataset
            .nodes
            .iter()
            .filter(|n| layout::band_of(layout::group_of(n)) == band)
            .map(|n| positions[&n.id].y)
            .collect::<Vec<_>>()
    };
    let basic = y_of(Band::Basic);
    let advanced = y_of(Band::Advanced);

    let lowest_basic = basic.iter().cloned().fold(f64::MIN, f64::max);
    let highest_advanced = advanced.iter().cloned().fold(f64::MAX, f64::min);
    assert!(!basic.is_empty() && !advanced.is_empty());
    assert!(lowest_basic < highest_advanced);
}

#[test]
fn given_untagged_node_when_planning_then_catch_all_column_is_last_basic() {
    let nodes = fixture_nodes();

    let plan = layout::plan(&nodes);

    let basic: Vec<_> = plan
        .groups
        .iter()
        .filter(|g| g.band == Band::Basic)
        .map(|g| g.name)
        .collect();
    assert_eq!(basic, vec!["Ten", "Zetsu", "Ren", "Hatsu", CATCH_ALL_GROUP]);
    assert_eq!(plan.basic_columns, 5);
    assert_eq!(plan.advanced_columns, 3);
}

#[test]
fn given_group_columns_when_computing_then_columns_split_the_width() {
    let nodes = vec![
        Node::new("t", 1).with_tags(&["Ten"]),
        Node::new("z", 1).with_tags(&["Zetsu"]),
    ];

    let positions = layout::compute(&nodes, 1000.0, 500.0);

    assert!((positions["t"].x - 250.0).abs() < 1e-9);
    assert!((positions["z"].x - 750.0).abs() < 1e-9);
    assert_eq!(positions["t"].y, positions["z"].y);
}

#[test]
fn given_cyclic_requirements_when_computing_then_terminates_with_finite_positions() {
    // Arrange
    let nodes = vec![
        Node::new("root", 1).with_tags(&["Ten"]).with_type("principle"),
        Node::new("a", 1).with_tags(&["Ten"]).with_requires(&["b"]),
        Node::new("b", 1).with_tags(&["Ten"]).with_requires(&["a"]),
        Node::new("self", 1).with_tags(&["Ko"]).with_requires(&["self"]),
    ];

    // Act
    let positions = layout::compute(&nodes, 800.0, 600.0);

    // Assert
    assert_eq!(positions.len(), 4);
    assert!(positions.values().all(|p| p.x.is_finite() && p.y.is_finite()));
}

#[test]
fn given_requirement_chain_when_computing_then_deeper_nodes_sit_lower() {
    let nodes = fixture_nodes();
    let positions = layout::compute(&nodes, 1080.0, 630.0);

    // ren (depth 0 in its group) above ren_fortalecido (depth 1)
    assert!(positions["ren"].y < positions["ren_fortalecido"].y);
}
