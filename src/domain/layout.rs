//! Deterministic graph layout: group columns split into two vertical bands.
//!
//! Nodes are grouped by their first principle tag (canonical order), each
//! band divides the full width into one column per present group, and rows
//! come from a bounded relaxation of the in-group requirement depth. The
//! advanced band always starts below the deepest basic row.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::entities::Node;

/// Canonical group order; also the column order.
pub const GROUP_ORDER: [&str; 11] = [
    "Ten", "Zetsu", "Ren", "Hatsu", "Gyo", "Shu", "In", "En", "Ryu", "Ken", "Ko",
];

/// Groups of the upper band.
pub const BASIC_GROUPS: [&str; 4] = ["Ten", "Zetsu", "Ren", "Hatsu"];

/// Groups of the lower band.
pub const ADVANCED_GROUPS: [&str; 7] = ["Gyo", "Shu", "In", "En", "Ryu", "Ken", "Ko"];

/// Group for nodes without any canonical tag. Lives in the basic band,
/// after every named column.
pub const CATCH_ALL_GROUP: &str = "Outros";

/// Upper bound on depth relaxation passes per group.
pub const MAX_RELAXATION_PASSES: usize = 200;

/// Empty rows between the deepest basic row and the first advanced row.
const BAND_GAP_ROWS: usize = 1;
/// Share of a column's width available to a row of nodes.
const COLUMN_SPAN_RATIO: f64 = 0.65;
/// Footprints never shrink below this factor.
const MIN_FOOTPRINT_SCALE: f64 = 0.35;
/// Vertical offset of every other node in a row, as a share of the row gap.
const STAGGER_RATIO: f64 = 0.08;

const CHAR_WIDTH: f64 = 7.0;
const LABEL_PADDING: f64 = 24.0;
const MIN_FOOTPRINT: f64 = 48.0;
const MAX_FOOTPRINT: f64 = 220.0;

/// Position of a node centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Band {
    Basic,
    Advanced,
}

/// Placement decisions for one group column.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    pub name: &'static str,
    pub band: Band,
    /// Column index within the band.
    pub column: usize,
    /// Rows skipped before this group's depth 0.
    pub row_offset: usize,
    /// `(node id, local depth)` in input order.
    pub depths: Vec<(String, usize)>,
}

impl GroupPlan {
    pub fn max_depth(&self) -> usize {
        self.depths.iter().map(|(_, d)| *d).max().unwrap_or(0)
    }

    /// Node ids per global row, input order within a row.
    pub fn rows(&self) -> BTreeMap<usize, Vec<&str>> {
        let mut rows: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for (id, depth) in &self.depths {
            rows.entry(depth + self.row_offset)
                .or_default()
                .push(id.as_str());
        }
        rows
    }
}

/// Grouping, banding and depth of a node set, before any coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutPlan {
    pub groups: Vec<GroupPlan>,
    pub basic_columns: usize,
    pub advanced_columns: usize,
}

impl LayoutPlan {
    pub fn columns_in(&self, band: Band) -> usize {
        match band {
            Band::Basic => self.basic_columns,
            Band::Advanced => self.advanced_columns,
        }
    }

    /// Deepest global row across all groups.
    pub fn max_row(&self) -> usize {
        self.groups
            .iter()
            .map(|g| g.max_depth() + g.row_offset)
            .max()
            .unwrap_or(0)
    }
}

/// Group a node belongs to: its first tag in [`GROUP_ORDER`].
pub fn group_of(node: &Node) -> &'static str {
    GROUP_ORDER
        .iter()
        .copied()
        .find(|g| node.tags.iter().any(|t| t == g))
        .unwrap_or(CATCH_ALL_GROUP)
}

pub fn band_of(group: &str) -> Band {
    if ADVANCED_GROUPS.contains(&group) {
        Band::Advanced
    } else {
        Band::Basic
    }
}

/// Group, band and depth every node. Never fails; cyclic requirements
/// stop relaxing after [`MAX_RELAXATION_PASSES`].
#[instrument(level = "debug", skip(nodes), fields(nodes = nodes.len()))]
pub fn plan(nodes: &[Node]) -> LayoutPlan {
    let mut by_group: BTreeMap<usize, Vec<&Node>> = BTreeMap::new();
    for node in nodes {
        let group = group_of(node);
        let rank = GROUP_ORDER
            .iter()
            .position(|g| *g == group)
            .unwrap_or(GROUP_ORDER.len());
        by_group.entry(rank).or_default().push(node);
    }

    let mut layout = LayoutPlan::default();
    for (rank, members) in &by_group {
        let name = GROUP_ORDER.get(*rank).copied().unwrap_or(CATCH_ALL_GROUP);
        let band = band_of(name);
        let column = match band {
            Band::Basic => {
                layout.basic_columns += 1;
                layout.basic_columns - 1
            }
            Band::Advanced => {
                layout.advanced_columns += 1;
                layout.advanced_columns - 1
            }
        };
        layout.groups.push(GroupPlan {
            name,
            band,
            column,
            row_offset: 0,
            depths: local_depths(name, members),
        });
    }

    let basic_max = layout
        .groups
        .iter()
        .filter(|g| g.band == Band::Basic)
        .map(GroupPlan::max_depth)
        .max()
        .unwrap_or(0);
    let advanced_offset = basic_max + BAND_GAP_ROWS + 1;
    for group in layout
        .groups
        .iter_mut()
        .filter(|g| g.band == Band::Advanced)
    {
        group.row_offset = advanced_offset;
    }

    layout
}

/// Compute a centre point for every node id in `nodes`.
///
/// Identical inputs always give identical output.
#[instrument(level = "debug", skip(nodes), fields(nodes = nodes.len()))]
pub fn compute(nodes: &[Node], width: f64, height: f64) -> BTreeMap<String, Point> {
    let width = finite_or_zero(width);
    let height = finite_or_zero(height);
    let layout = plan(nodes);
    let labels: HashMap<&str, &str> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.label.as_str()))
        .collect();

    let row_gap = height / (layout.max_row().max(1) + 2) as f64;
    let mut positions = BTreeMap::new();

    for group in &layout.groups {
        let columns = layout.columns_in(group.band).max(1);
        let col_width = width / columns as f64;
        let center_x = group.column as f64 * col_width + col_width * 0.5;
        let span = col_width * COLUMN_SPAN_RATIO;

        for (row, ids) in group.rows() {
            let footprints: Vec<f64> = ids
                .iter()
                .map(|id| footprint(labels.get(id).copied().unwrap_or(*id)))
                .collect();
            let total: f64 = footprints.iter().sum();
            let scale = fit_scale(total, span);
            let base_y = (row + 1) as f64 * row_gap;

            let mut cursor = center_x - total * scale / 2.0;
            for (i, (id, fp)) in ids.iter().zip(&footprints).enumerate() {
                let w = fp * scale;
                let x = cursor + w / 2.0;
                cursor += w;
                let y = if i % 2 == 1 {
                    base_y + row_gap * STAGGER_RATIO
                } else {
                    base_y
                };
                positions.insert(id.to_string(), Point { x, y });
            }
        }
    }

    debug!(placed = positions.len(), row_gap, "layout computed");
    positions
}

/// Depth of each group member relative to the group root (depth 0).
fn local_depths(group: &str, members: &[&Node]) -> Vec<(String, usize)> {
    let Some(root) = members
        .iter()
        .find(|n| n.is_group_root())
        .or_else(|| members.first())
    else {
        return Vec::new();
    };

    let in_group: HashSet<&str> = members.iter().map(|n| n.id.as_str()).collect();
    let mut depth: HashMap<&str, usize> = HashMap::new();
    depth.insert(root.id.as_str(), 0);

    let mut changed = true;
    let mut passes = 0;
    while changed && passes < MAX_RELAXATION_PASSES {
        changed = false;
        passes += 1;
        for node in members {
            if node.id == root.id {
                continue;
            }
            let d = node
                .prerequisites()
                .filter(|p| in_group.contains(p))
                .map(|p| depth.get(p).copied().unwrap_or(0))
                .max()
                .map_or(1, |m| m + 1);
            if depth.get(node.id.as_str()) != Some(&d) {
                depth.insert(node.id.as_str(), d);
                changed = true;
            }
        }
    }
    if changed {
        debug!(group, passes, "depth relaxation stopped at pass limit");
    }

    members
        .iter()
        .map(|n| (n.id.clone(), depth.get(n.id.as_str()).copied().unwrap_or(0)))
        .collect()
}

/// Estimated width of a node with its label.
fn footprint(label: &str) -> f64 {
    (label.chars().count() as f64 * CHAR_WIDTH + LABEL_PADDING).clamp(MIN_FOOTPRINT, MAX_FOOTPRINT)
}

fn fit_scale(total: f64, span: f64) -> f64 {
    if total > span && total > 0.0 {
        (span / total).max(MIN_FOOTPRINT_SCALE)
    } else {
        1.0
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}
