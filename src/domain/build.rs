//! Build snapshots: export and import of a selection.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::engine::RuleEngine;
use crate::domain::error::DomainError;
use crate::domain::layout::Point;

/// Serializable snapshot of a selection.
///
/// `statTotals` and `pointsSpent` are informational on import; both are
/// recomputed from the restored selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPayload {
    /// Missing on import means "keep the current budget".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_max: Option<u32>,
    #[serde(default)]
    pub points_spent: u32,
    #[serde(default)]
    pub active: Vec<String>,
    #[serde(default, alias = "stats")]
    pub stat_totals: BTreeMap<String, f64>,
    /// Stack levels of stackable nodes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stacks: BTreeMap<String, u32>,
    /// Manual node positions, overriding the computed layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<BTreeMap<String, Point>>,
}

impl BuildPayload {
    pub fn from_json(content: &str) -> Result<Self, DomainError> {
        serde_json::from_str(content).map_err(|e| DomainError::Parse {
            what: "build",
            message: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, DomainError> {
        serde_json::to_string_pretty(self).map_err(|e| DomainError::Parse {
            what: "build",
            message: e.to_string(),
        })
    }
}

/// Outcome of [`RuleEngine::import_build`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Ids activated, in the order they were bought.
    pub restored: Vec<String>,
    /// Requested ids that could not be activated, sorted.
    pub dropped: Vec<String>,
    /// Stack levels that could not be rebought, per node.
    pub stack_shortfall: BTreeMap<String, u32>,
    /// Fixed-point passes over the dataset.
    pub passes: usize,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty() && self.stack_shortfall.is_empty()
    }
}

impl RuleEngine {
    /// Snapshot of the current selection. `active` follows dataset order.
    pub fn export_build(&self) -> BuildPayload {
        BuildPayload {
            points_max: Some(self.points_max()),
            points_spent: self.points_spent(),
            active: self.active_nodes().map(|n| n.id.clone()).collect(),
            stat_totals: self.stat_totals().clone(),
            stacks: self.stack_levels().clone(),
            positions: None,
        }
    }

    /// Replace the selection with `payload`.
    ///
    /// The selection is reset, the budget restored, then requested ids are
    /// bought through the normal rules in dataset order, repeating until a
    /// pass activates nothing. Ids that never pass (unknown, unaffordable or
    /// unsatisfiable) are dropped and reported. Stack levels are rebought
    /// afterwards, one level at a time.
    #[instrument(level = "debug", skip(self, payload), fields(requested = payload.active.len()))]
    pub fn import_build(&mut self, payload: &BuildPayload) -> ImportReport {
        self.reset();
        if let Some(max) = payload.points_max {
            self.set_points_max(i64::from(max));
        }

        let mut wanted: BTreeSet<&str> = payload.active.iter().map(String::as_str).collect();
        let order: Vec<String> = self.nodes().iter().map(|n| n.id.clone()).collect();
        let mut report = ImportReport::default();

        let mut progressed = true;
        while progressed && !wanted.is_empty() {
            progressed = false;
            report.passes += 1;
            for id in &order {
                if wanted.contains(id.as_str()) && self.buy(id).is_ok() {
                    wanted.remove(id.as_str());
                    report.restored.push(id.clone());
                    progressed = true;
                }
            }
        }
        report.dropped = wanted.into_iter().map(str::to_string).collect();

        for (id, &target) in &payload.stacks {
            if !self.is_active(id) || !self.is_stackable(id) {
                continue;
            }
            while self.stack_level(id) < target {
                if let Err(e) = self.buy_stack(id) {
                    debug!(%id, error = %e, "cannot restore stack level");
                    report
                        .stack_shortfall
                        .insert(id.clone(), target - self.stack_level(id));
                    break;
                }
            }
        }

        debug!(
            restored = report.restored.len(),
            dropped = report.dropped.len(),
            passes = report.passes,
            "build imported"
        );
        report
    }
}
