//! Stackable nodes: bought level by level, each level one point dearer.
//!
//! Level `k` (k >= 1) of a node with base cost `b` costs `b + (k - 1)`.

use regex::Regex;
use tracing::{debug, instrument};

use crate::domain::engine::{RuleEngine, RuleResult, LEVEL_UP_CHECKS};
use crate::domain::entities::Node;
use crate::domain::error::RuleError;

/// Label pattern that marks a node as stackable when the dataset does not
/// say so explicitly ("Expansão de Aura").
pub const DEFAULT_STACKABLE_PATTERN: &str = r"(?i)expans[aã]o\s+de\s+aura";

/// Decides whether a node is bought level by level.
///
/// A node is stackable if its `stackable` flag is set, or if its label
/// matches the configured pattern.
#[derive(Debug, Clone)]
pub struct StackablePredicate {
    label_pattern: Option<Regex>,
}

impl Default for StackablePredicate {
    fn default() -> Self {
        Self::from_pattern(DEFAULT_STACKABLE_PATTERN).unwrap_or_else(|_| Self::explicit_only())
    }
}

impl StackablePredicate {
    /// Predicate using `pattern` for label inference. An empty pattern
    /// disables inference.
    pub fn from_pattern(pattern: &str) -> Result<Self, regex::Error> {
        if pattern.trim().is_empty() {
            return Ok(Self::explicit_only());
        }
        Ok(Self {
            label_pattern: Some(Regex::new(pattern)?),
        })
    }

    /// Only the explicit `stackable` flag counts.
    pub fn explicit_only() -> Self {
        Self {
            label_pattern: None,
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        node.stackable
            || self
                .label_pattern
                .as_ref()
                .is_some_and(|re| re.is_match(&node.label))
    }
}

/// Cost of level `level` (1-based) for base cost `base`. Saturates at
/// `u32::MAX`, which no budget can cover on top of a bought level.
pub fn level_cost(base: u32, level: u32) -> u32 {
    base.saturating_add(level.saturating_sub(1))
}

/// Total paid for levels `1..=levels`, saturating.
pub fn total_stack_cost(base: u32, levels: u32) -> u32 {
    (1..=levels).fold(0u32, |total, k| total.saturating_add(level_cost(base, k)))
}

impl RuleEngine {
    /// Check whether one more level of `id` can be bought.
    ///
    /// For level 0 (and for non-stackable nodes) this is [`Self::can_buy`].
    /// Otherwise the static requirements are re-checked against the current
    /// selection, followed by the budget for the next level.
    pub fn can_buy_stack(&self, id: &str) -> RuleResult<()> {
        if !self.is_stackable(id) || self.stack_level(id) == 0 {
            return self.can_buy(id);
        }
        self.validate(id, LEVEL_UP_CHECKS).map(|_| ())
    }

    /// Buy one more level. Returns the new level (1 for plain nodes).
    #[instrument(level = "debug", skip(self))]
    pub fn buy_stack(&mut self, id: &str) -> RuleResult<u32> {
        if !self.is_stackable(id) || self.stack_level(id) == 0 {
            self.buy(id)?;
            return Ok(1);
        }

        let level = self.stack_level(id);
        let base = self.validate(id, LEVEL_UP_CHECKS)?.cost;
        let cost = level_cost(base, level + 1);

        self.state.points_spent = self.state.points_spent.saturating_add(cost);
        self.state.stack_level.insert(id.to_string(), level + 1);
        debug!(level = level + 1, cost, spent = self.state.points_spent, "stack level bought");
        Ok(level + 1)
    }

    /// Refund the most recently bought level. Returns the new level.
    ///
    /// Dropping from level 1 to 0 deactivates the node and goes through
    /// [`Self::refund`], so active dependents still block it.
    #[instrument(level = "debug", skip(self))]
    pub fn refund_stack(&mut self, id: &str) -> RuleResult<u32> {
        let base = self
            .node(id)
            .map(|n| n.cost)
            .ok_or_else(|| RuleError::NodeNotFound(id.to_string()))?;

        if !self.is_stackable(id) {
            self.refund(id)?;
            return Ok(0);
        }

        match self.stack_level(id) {
            0 => Err(RuleError::NotActive(id.to_string())),
            1 => {
                self.refund(id)?;
                Ok(0)
            }
            level => {
                let cost = level_cost(base, level);
                self.state.points_spent = self.state.points_spent.saturating_sub(cost);
                self.state.stack_level.insert(id.to_string(), level - 1);
                debug!(level = level - 1, cost, spent = self.state.points_spent, "stack level refunded");
                Ok(level - 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Dataset;

    #[test]
    fn test_level_costs() {
        assert_eq!(level_cost(2, 1), 2);
        assert_eq!(level_cost(2, 2), 3);
        assert_eq!(level_cost(2, 3), 4);
        assert_eq!(total_stack_cost(2, 0), 0);
        assert_eq!(total_stack_cost(2, 3), 9);
    }

    #[test]
    fn given_huge_base_cost_when_pricing_then_saturates() {
        assert_eq!(level_cost(u32::MAX, 2), u32::MAX);
        assert_eq!(total_stack_cost(u32::MAX - 1, 3), u32::MAX);
    }

    #[test]
    fn given_label_pattern_when_matching_then_infers_stackable() {
        let predicate = StackablePredicate::default();
        let by_label = Node::new("ea", 2).with_label("Expansão de Aura");
        let ascii = Node::new("ea2", 2).with_label("expansao  de AURA II");
        let flagged = Node::new("f", 1).stackable();
        let plain = Node::new("p", 1).with_label("Ten");

        assert!(predicate.matches(&by_label));
        assert!(predicate.matches(&ascii));
        assert!(predicate.matches(&flagged));
        assert!(!predicate.matches(&plain));
        assert!(!StackablePredicate::explicit_only().matches(&by_label));
    }

    #[test]
    fn given_invalid_pattern_when_building_then_errors() {
        assert!(StackablePredicate::from_pattern("(unclosed").is_err());
        assert!(StackablePredicate::from_pattern("  ").is_ok());
    }

    #[test]
    fn given_plain_node_when_buy_stack_then_behaves_like_buy() {
        let dataset = Dataset::new(10, vec![Node::new("a", 3)]);
        let mut engine = RuleEngine::new(&dataset).unwrap();

        assert_eq!(engine.buy_stack("a").unwrap(), 1);
        assert!(matches!(
            engine.buy_stack("a"),
            Err(RuleError::AlreadyActive(_))
        ));
        assert_eq!(engine.points_spent(), 3);
        assert_eq!(engine.stack_level("a"), 0);

        assert_eq!(engine.refund_stack("a").unwrap(), 0);
        assert_eq!(engine.points_spent(), 0);
    }

    #[test]
    fn given_stacked_node_when_plain_refund_then_returns_all_levels() {
        let dataset = Dataset::new(20, vec![Node::new("s", 2).stackable()]);
        let mut engine = RuleEngine::new(&dataset).unwrap();
        engine.buy_stack("s").unwrap();
        engine.buy_stack("s").unwrap();
        assert_eq!(engine.points_spent(), 5);

        engine.refund("s").unwrap();

        assert_eq!(engine.points_spent(), 0);
        assert_eq!(engine.stack_level("s"), 0);
        assert!(!engine.is_active("s"));
    }
}
