//! Rule engine: selection state, validation pipeline and derived aggregates.
//!
//! A [`RuleEngine`] is an ordinary owned value. Every mutation takes
//! `&mut self`, so callers serialize mutations by construction, and any
//! number of independent engines (e.g. one per test) can coexist.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::domain::entities::{Dataset, EffectOp, Node, Stage};
use crate::domain::error::RuleError;
use crate::domain::stack::{level_cost, total_stack_cost, StackablePredicate};

/// Result type for rule engine operations.
pub type RuleResult<T> = Result<T, RuleError>;

/// Mutable selection owned by a [`RuleEngine`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub points_max: u32,
    pub points_spent: u32,
    /// Purchased node ids (level >= 1 for stackable nodes).
    pub active: BTreeSet<String>,
    /// Stack level per active stackable node; absent means 0.
    pub stack_level: BTreeMap<String, u32>,
    /// Derived, recomputed after every mutation.
    pub stat_totals: BTreeMap<String, f64>,
}

/// Single validation step of the purchase pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Check {
    NotYetActive,
    Budget,
    RequiresAll,
    RequiresAny,
    Stage,
    NextLevelBudget,
}

/// Checks for a first purchase, in contract order.
pub(crate) const BUY_CHECKS: &[Check] = &[
    Check::NotYetActive,
    Check::Budget,
    Check::RequiresAll,
    Check::RequiresAny,
    Check::Stage,
];

/// Checks for buying one more level of an already active stackable node.
pub(crate) const LEVEL_UP_CHECKS: &[Check] = &[
    Check::RequiresAll,
    Check::RequiresAny,
    Check::Stage,
    Check::NextLevelBudget,
];

/// Purchase status of a node relative to the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    /// Purchased. `can_level_up` is only ever true for stackable nodes.
    Active { level: u32, can_level_up: bool },
    Available,
    Locked(RuleError),
}

/// Owns the node table and the selection, and enforces the budget and
/// prerequisite invariants.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    pub(crate) nodes: Vec<Node>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) stackable: StackablePredicate,
    pub(crate) state: SelectionState,
}

impl RuleEngine {
    /// Load a dataset. Nodes are deep-copied; later edits to `dataset` are
    /// not seen by the engine.
    #[instrument(level = "debug", skip(dataset), fields(nodes = dataset.nodes.len()))]
    pub fn new(dataset: &Dataset) -> RuleResult<Self> {
        let mut index = HashMap::with_capacity(dataset.nodes.len());
        for (pos, node) in dataset.nodes.iter().enumerate() {
            if node.id.is_empty() {
                return Err(RuleError::InvalidDataset(format!(
                    "node at position {} has no id",
                    pos
                )));
            }
            if index.insert(node.id.clone(), pos).is_some() {
                return Err(RuleError::InvalidDataset(format!(
                    "duplicate node id: {}",
                    node.id
                )));
            }
        }

        let mut engine = Self {
            nodes: dataset.nodes.clone(),
            index,
            stackable: StackablePredicate::default(),
            state: SelectionState {
                points_max: dataset.ruleset.max_points,
                ..SelectionState::default()
            },
        };
        engine.recompute_stats();
        debug!(points_max = engine.state.points_max, "rule engine initialized");
        Ok(engine)
    }

    /// Replace the stackable-node predicate. Intended for construction time,
    /// before anything is bought.
    pub fn with_stackable_predicate(mut self, predicate: StackablePredicate) -> Self {
        self.stackable = predicate;
        self
    }

    /// Set the budget, clamped at 0. An already over-budget selection is
    /// kept; the cap only blocks later purchases.
    pub fn set_points_max(&mut self, value: i64) {
        self.state.points_max = value.clamp(0, i64::from(u32::MAX)) as u32;
        debug!(points_max = self.state.points_max, "points max updated");
    }

    /// Clear the selection. `points_max` is kept.
    pub fn reset(&mut self) {
        self.state.active.clear();
        self.state.stack_level.clear();
        self.state.points_spent = 0;
        self.state.stat_totals.clear();
        debug!("selection reset");
    }

    // ------------------------------------------------------------
    // Purchase
    // ------------------------------------------------------------

    pub fn can_buy(&self, id: &str) -> RuleResult<()> {
        self.validate(id, BUY_CHECKS).map(|_| ())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn buy(&mut self, id: &str) -> RuleResult<()> {
        let (cost, stackable) = {
            let node = self.validate(id, BUY_CHECKS)?;
            (node.cost, self.stackable.matches(node))
        };

        self.state.active.insert(id.to_string());
        if stackable {
            self.state.stack_level.insert(id.to_string(), 1);
        }
        self.state.points_spent = self.state.points_spent.saturating_add(cost);
        self.recompute_stats();
        debug!(cost, spent = self.state.points_spent, "bought");
        Ok(())
    }

    pub fn can_refund(&self, id: &str) -> RuleResult<()> {
        if !self.is_active(id) {
            return Err(RuleError::NotActive(id.to_string()));
        }
        if let Some(dependent) = self.active_nodes().find(|n| n.depends_on(id)) {
            return Err(RuleError::DependencyExists {
                id: id.to_string(),
                dependent: dependent.id.clone(),
            });
        }
        Ok(())
    }

    /// Deactivate a node and give back everything paid for it. For a stacked
    /// node this is the cost of all its levels.
    #[instrument(level = "debug", skip(self))]
    pub fn refund(&mut self, id: &str) -> RuleResult<()> {
        self.can_refund(id)?;

        let base = self.node(id).map_or(0, |n| n.cost);
        let refunded = match self.state.stack_level.remove(id) {
            Some(level) => total_stack_cost(base, level),
            None => base,
        };
        self.state.active.remove(id);
        self.state.points_spent = self.state.points_spent.saturating_sub(refunded);
        self.recompute_stats();
        debug!(refunded, spent = self.state.points_spent, "refunded");
        Ok(())
    }

    /// Run `checks` in order against node `id`, stopping at the first failure.
    pub(crate) fn validate(&self, id: &str, checks: &[Check]) -> RuleResult<&Node> {
        let node = self
            .node(id)
            .ok_or_else(|| RuleError::NodeNotFound(id.to_string()))?;
        for check in checks {
            self.run_check(*check, node)?;
        }
        Ok(node)
    }

    fn run_check(&self, check: Check, node: &Node) -> RuleResult<()> {
        trace!(?check, id = %node.id, "check");
        match check {
            Check::NotYetActive => {
                if self.is_active(&node.id) {
                    return Err(RuleError::AlreadyActive(node.id.clone()));
                }
            }
            Check::Budget => self.ensure_budget(node, node.cost)?,
            Check::NextLevelBudget => {
                let next = self.stack_level(&node.id) + 1;
                self.ensure_budget(node, level_cost(node.cost, next))?
            }
            Check::RequiresAll => {
                let missing: Vec<String> = node
                    .requires
                    .iter()
                    .filter(|r| !self.is_active(r))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return Err(RuleError::MissingRequiredAll {
                        id: node.id.clone(),
                        missing,
                    });
                }
            }
            Check::RequiresAny => {
                if !node.requires_any.is_empty()
                    && !node.requires_any.iter().any(|r| self.is_active(r))
                {
                    return Err(RuleError::MissingRequiredAny {
                        id: node.id.clone(),
                        options: node.requires_any.clone(),
                    });
                }
            }
            Check::Stage => {
                if let Some(required) = node.req_stage {
                    let current = self.stage();
                    if current < required {
                        return Err(RuleError::StageTooLow {
                            id: node.id.clone(),
                            required,
                            current,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn ensure_budget(&self, node: &Node, needed: u32) -> RuleResult<()> {
        let fits = self
            .state
            .points_spent
            .checked_add(needed)
            .is_some_and(|total| total <= self.state.points_max);
        if !fits {
            return Err(RuleError::InsufficientPoints {
                id: node.id.clone(),
                needed,
                remaining: self.points_remaining(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------
    // Derived aggregates
    // ------------------------------------------------------------

    /// Sum of the cost of active principle-tagged nodes (PN).
    pub fn principle_points(&self) -> u32 {
        self.active_nodes()
            .filter(|n| n.is_principle_tagged())
            .fold(0u32, |pn, n| pn.saturating_add(n.cost))
    }

    /// Current progression tier, derived from [`Self::principle_points`].
    pub fn stage(&self) -> Stage {
        Stage::from_principle_points(self.principle_points())
    }

    /// Rebuild stat totals from scratch over active nodes in dataset order.
    pub(crate) fn recompute_stats(&mut self) {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for node in self.active_nodes() {
            for effect in &node.effects {
                match effect.op {
                    EffectOp::Add => {
                        *totals.entry(effect.stat.clone()).or_insert(0.0) += effect.value;
                    }
                    EffectOp::Mul => {
                        totals
                            .entry(effect.stat.clone())
                            .and_modify(|total| *total *= effect.value)
                            .or_insert(effect.value);
                    }
                    EffectOp::Unknown => {
                        trace!(id = %node.id, stat = %effect.stat, "ignoring unknown effect op")
                    }
                }
            }
        }
        self.state.stat_totals = totals;
    }

    /// Status of a node for display: active (with level), available, or
    /// locked with the first failing reason.
    pub fn status(&self, id: &str) -> NodeStatus {
        if self.is_active(id) {
            let stackable = self.is_stackable(id);
            return NodeStatus::Active {
                level: self.stack_level(id).max(1),
                can_level_up: stackable && self.can_buy_stack(id).is_ok(),
            };
        }
        match self.can_buy(id) {
            Ok(()) => NodeStatus::Available,
            Err(e) => NodeStatus::Locked(e),
        }
    }

    // ------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn points_max(&self) -> u32 {
        self.state.points_max
    }

    pub fn points_spent(&self) -> u32 {
        self.state.points_spent
    }

    pub fn points_remaining(&self) -> u32 {
        self.state.points_max.saturating_sub(self.state.points_spent)
    }

    pub fn active(&self) -> &BTreeSet<String> {
        &self.state.active
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.state.active.contains(id)
    }

    /// Stack level of `id`; 0 when not stacked.
    pub fn stack_level(&self, id: &str) -> u32 {
        self.state.stack_level.get(id).copied().unwrap_or(0)
    }

    pub fn stack_levels(&self) -> &BTreeMap<String, u32> {
        &self.state.stack_level
    }

    pub fn stat_totals(&self) -> &BTreeMap<String, f64> {
        &self.state.stat_totals
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).and_then(|&pos| self.nodes.get(pos))
    }

    /// All nodes in dataset order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Active nodes in dataset order.
    pub fn active_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(move |n| self.state.active.contains(&n.id))
    }

    /// True if `id` is a known node bought level by level.
    pub fn is_stackable(&self, id: &str) -> bool {
        self.node(id).is_some_and(|n| self.stackable.matches(n))
    }
}
