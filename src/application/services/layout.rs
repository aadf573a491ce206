//! Layout and tree views of a session
//!
//! Combines the layout engine with host overrides and renders the
//! group/depth plan as a terminal tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::services::Session;
use crate::config::Settings;
use crate::domain::layout::{self, Band};
use crate::domain::{NodeStatus, Point, RuleEngine};

/// One row of the node listing.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLine {
    pub id: String,
    pub label: String,
    pub cost: u32,
    pub group: &'static str,
    pub status: NodeStatus,
}

/// Computes positions and textual views.
pub struct LayoutService {
    settings: Arc<Settings>,
}

impl LayoutService {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Canvas from settings, after applying the usable margin.
    pub fn canvas(&self) -> (f64, f64) {
        self.settings.layout.canvas()
    }

    /// Positions for every node: saved positions win over computed ones.
    #[instrument(level = "debug", skip(self, session))]
    pub fn positions(&self, session: &Session, width: f64, height: f64) -> BTreeMap<String, Point> {
        let mut positions = layout::compute(session.engine.nodes(), width, height);
        if let Some(saved) = &session.positions {
            let mut overridden = 0usize;
            for (id, point) in saved {
                // ids no longer in the dataset are ignored
                if let Some(slot) = positions.get_mut(id) {
                    *slot = *point;
                    overridden += 1;
                }
            }
            debug!(overridden, "applied saved positions");
        }
        positions
    }

    /// Listing of all nodes in dataset order with their availability.
    pub fn node_lines(&self, engine: &RuleEngine) -> Vec<NodeLine> {
        engine
            .nodes()
            .iter()
            .map(|n| NodeLine {
                id: n.id.clone(),
                label: n.to_string(),
                cost: n.cost,
                group: layout::group_of(n),
                status: engine.status(&n.id),
            })
            .collect()
    }

    /// Group columns and depth rows as a tree, basic band first.
    pub fn tree(&self, engine: &RuleEngine) -> Tree<String> {
        let plan = layout::plan(engine.nodes());
        let mut root = Tree::new(format!(
            "skill tree ({} / {} points, {})",
            engine.points_spent(),
            engine.points_max(),
            engine.stage()
        ));

        for band in [Band::Basic, Band::Advanced] {
            let mut band_node = Tree::new(format!("{:?}", band));
            for group in plan.groups.iter().filter(|g| g.band == band) {
                let mut group_node = Tree::new(group.name.to_string());
                for (row, ids) in group.rows() {
                    let mut row_node = Tree::new(format!("row {}", row));
                    for id in ids {
                        row_node.push(Tree::new(Self::node_label(engine, id)));
                    }
                    group_node.push(row_node);
                }
                band_node.push(group_node);
            }
            if !band_node.leaves.is_empty() {
                root.push(band_node);
            }
        }
        root
    }

    fn node_label(engine: &RuleEngine, id: &str) -> String {
        let name = engine.node(id).map_or_else(|| id.to_string(), |n| n.to_string());
        match engine.status(id) {
            NodeStatus::Active { level, .. } if level > 1 => format!("[x] {} (x{})", name, level),
            NodeStatus::Active { .. } => format!("[x] {}", name),
            NodeStatus::Available => format!("[ ] {}", name),
            NodeStatus::Locked(_) => format!("[-] {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dataset, Node};

    fn session() -> Session {
        let dataset = Dataset::new(
            10,
            vec![
                Node::new("ten", 1).with_tags(&["Ten"]).with_type("principle"),
                Node::new("gyo", 2).with_tags(&["Gyo"]).with_requires(&["ten"]),
            ],
        );
        Session::new(RuleEngine::new(&dataset).unwrap())
    }

    #[test]
    fn given_saved_positions_when_computing_then_saved_win() {
        let service = LayoutService::new(Arc::new(Settings::default()));
        let mut session = session();
        session.positions = Some(BTreeMap::from([
            ("gyo".to_string(), Point { x: 5.0, y: 6.0 }),
            ("gone".to_string(), Point { x: 0.0, y: 0.0 }),
        ]));

        let positions = service.positions(&session, 1000.0, 600.0);

        assert_eq!(positions["gyo"], Point { x: 5.0, y: 6.0 });
        assert!(!positions.contains_key("gone"));
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn given_engine_when_rendering_tree_then_lists_bands_and_marks() {
        let service = LayoutService::new(Arc::new(Settings::default()));
        let mut session = session();
        session.engine.buy("ten").unwrap();

        let rendered = service.tree(&session.engine).to_string();

        assert!(rendered.contains("Basic"));
        assert!(rendered.contains("Advanced"));
        assert!(rendered.contains("[x] ten"));
        assert!(rendered.contains("[ ] gyo"));
    }

    #[test]
    fn given_engine_when_listing_nodes_then_reports_group_and_status() {
        let service = LayoutService::new(Arc::new(Settings::default()));
        let lines = service.node_lines(&session().engine);

        assert_eq!(lines[0].group, "Ten");
        assert_eq!(lines[1].group, "Gyo");
        assert!(matches!(lines[1].status, NodeStatus::Locked(_)));
    }
}
