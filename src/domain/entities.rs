//! Domain entities: dataset, nodes and their static attributes

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::domain::error::DomainError;

/// Tags whose node cost counts towards the principle points (PN).
pub const PRINCIPLE_TAGS: [&str; 5] = ["Ten", "Zetsu", "Ren", "Hatsu", "Fundamental"];

/// Node `type` marking the defining root of a layout group.
pub const PRINCIPLE_TYPE: &str = "principle";

/// Progression tier, derived from principle points.
///
/// Accepts the Portuguese dataset names (`Iniciante`, `Perito`, `Mestre`)
/// as well as the English ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(alias = "Iniciante")]
    Novice = 1,
    #[serde(alias = "Perito")]
    Expert = 2,
    #[serde(alias = "Mestre")]
    Master = 3,
}

impl Stage {
    /// Lowest principle points needed for `Expert`.
    pub const EXPERT_THRESHOLD: u32 = 10;
    /// Lowest principle points needed for `Master`.
    pub const MASTER_THRESHOLD: u32 = 31;

    /// Map principle points to a tier: 0–9 Novice, 10–30 Expert, 31+ Master.
    pub fn from_principle_points(pn: u32) -> Self {
        if pn >= Self::MASTER_THRESHOLD {
            Stage::Master
        } else if pn >= Self::EXPERT_THRESHOLD {
            Stage::Expert
        } else {
            Stage::Novice
        }
    }

    /// Parse a dataset stage name, English or Portuguese.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Novice" | "Iniciante" => Some(Stage::Novice),
            "Expert" | "Perito" => Some(Stage::Expert),
            "Master" | "Mestre" => Some(Stage::Master),
            _ => None,
        }
    }

    /// Numeric tier (1..=3).
    pub fn tier(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Novice => "Novice",
            Stage::Expert => "Expert",
            Stage::Master => "Master",
        };
        write!(f, "{}", name)
    }
}

/// Aggregation operator of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectOp {
    Add,
    #[serde(alias = "multiply")]
    Mul,
    /// Unrecognized operator, ignored during aggregation.
    #[serde(other)]
    Unknown,
}

/// Stat modifier applied while its node is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub stat: String,
    pub op: EffectOp,
    pub value: f64,
}

/// Display-only technique descriptor, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technique {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// A purchasable unit of the skill tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub cost: u32,
    /// All of these must be active (AND).
    #[serde(default)]
    pub requires: Vec<String>,
    /// At least one of these must be active if non-empty (OR).
    #[serde(default)]
    pub requires_any: Vec<String>,
    /// Unknown stage names leave the node ungated.
    #[serde(
        default,
        deserialize_with = "lenient_stage",
        skip_serializing_if = "Option::is_none"
    )]
    pub req_stage: Option<Stage>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub stackable: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub techniques: Vec<Technique>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

fn lenient_stage<'de, D>(deserializer: D) -> Result<Option<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.and_then(|name| {
        let stage = Stage::from_name(&name);
        if stage.is_none() {
            warn!(stage = %name, "unknown reqStage, node is not stage gated");
        }
        stage
    }))
}

impl Node {
    /// Minimal node, mostly useful for tests and programmatic datasets.
    pub fn new(id: impl Into<String>, cost: u32) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            cost,
            requires: Vec::new(),
            requires_any: Vec::new(),
            req_stage: None,
            tags: Vec::new(),
            effects: Vec::new(),
            stackable: false,
            node_type: None,
            techniques: Vec::new(),
            notes: None,
            desc: None,
            icon: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_requires(mut self, ids: &[&str]) -> Self {
        self.requires = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_requires_any(mut self, ids: &[&str]) -> Self {
        self.requires_any = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.req_stage = Some(stage);
        self
    }

    pub fn with_effect(mut self, stat: &str, op: EffectOp, value: f64) -> Self {
        self.effects.push(Effect {
            stat: stat.to_string(),
            op,
            value,
        });
        self
    }

    pub fn with_type(mut self, node_type: &str) -> Self {
        self.node_type = Some(node_type.to_string());
        self
    }

    pub fn stackable(mut self) -> Self {
        self.stackable = true;
        self
    }

    /// True if any tag belongs to the principle set.
    pub fn is_principle_tagged(&self) -> bool {
        self.tags.iter().any(|t| PRINCIPLE_TAGS.contains(&t.as_str()))
    }

    /// True if this node defines its layout group.
    pub fn is_group_root(&self) -> bool {
        self.node_type.as_deref() == Some(PRINCIPLE_TYPE)
    }

    /// Every prerequisite id, AND list first, then OR list.
    pub fn prerequisites(&self) -> impl Iterator<Item = &str> {
        self.requires
            .iter()
            .chain(self.requires_any.iter())
            .map(String::as_str)
    }

    /// True if `id` appears in `requires` or `requires_any`.
    pub fn depends_on(&self, id: &str) -> bool {
        self.prerequisites().any(|p| p == id)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}", self.label)
        }
    }
}

/// Global rules of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ruleset {
    pub max_points: u32,
}

/// Complete skill tree definition as loaded by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub ruleset: Ruleset,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Dataset {
    pub fn new(max_points: u32, nodes: Vec<Node>) -> Self {
        Self {
            ruleset: Ruleset { max_points },
            nodes,
        }
    }

    /// Parse a dataset document.
    pub fn from_json(content: &str) -> Result<Self, DomainError> {
        serde_json::from_str(content).map_err(|e| DomainError::Parse {
            what: "dataset",
            message: e.to_string(),
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_portuguese_stage_names_when_parsing_then_maps_to_tiers() {
        let json = r#"{
            "ruleset": {"maxPoints": 40},
            "nodes": [
                {"id": "a", "label": "A", "cost": 2, "reqStage": "Perito"},
                {"id": "b", "reqStage": "Mestre", "requiresAny": ["a"]},
                {"id": "c", "reqStage": "Novice"}
            ]
        }"#;
        let dataset = Dataset::from_json(json).expect("parse dataset");

        assert_eq!(dataset.ruleset.max_points, 40);
        assert_eq!(dataset.nodes[0].req_stage, Some(Stage::Expert));
        assert_eq!(dataset.nodes[1].req_stage, Some(Stage::Master));
        assert_eq!(dataset.nodes[1].requires_any, vec!["a".to_string()]);
        assert_eq!(dataset.nodes[1].cost, 0);
        assert_eq!(dataset.nodes[2].req_stage, Some(Stage::Novice));
    }

    #[test]
    fn given_unknown_stage_name_when_parsing_then_node_is_ungated() {
        let json = r#"{"nodes": [
            {"id": "a", "reqStage": "Avancado"},
            {"id": "b", "reqStage": null},
            {"id": "c", "reqStage": "Mestre"}
        ]}"#;

        let dataset = Dataset::from_json(json).expect("parse dataset");

        assert_eq!(dataset.nodes[0].req_stage, None);
        assert_eq!(dataset.nodes[1].req_stage, None);
        assert_eq!(dataset.nodes[2].req_stage, Some(Stage::Master));
    }

    #[test]
    fn given_effect_ops_when_parsing_then_accepts_aliases_and_unknown() {
        let json = r#"{"nodes": [{"id": "a", "effects": [
            {"stat": "aura", "op": "add", "value": 2},
            {"stat": "aura", "op": "multiply", "value": 1.5},
            {"stat": "aura", "op": "mul", "value": 2},
            {"stat": "aura", "op": "pow", "value": 3}
        ]}]}"#;
        let dataset = Dataset::from_json(json).expect("parse dataset");
        let ops: Vec<EffectOp> = dataset.nodes[0].effects.iter().map(|e| e.op).collect();

        assert_eq!(
            ops,
            vec![EffectOp::Add, EffectOp::Mul, EffectOp::Mul, EffectOp::Unknown]
        );
    }

    #[test]
    fn given_techniques_when_parsing_then_passes_through_details() {
        let json = r#"{"nodes": [{"id": "a", "type": "principle", "techniques": [
            {"name": "Jajanken", "pa_cost": 3, "range": "melee"}
        ]}]}"#;
        let dataset = Dataset::from_json(json).expect("parse dataset");
        let node = &dataset.nodes[0];

        assert!(node.is_group_root());
        assert_eq!(node.techniques[0].name, "Jajanken");
        assert_eq!(
            node.techniques[0].details.get("range"),
            Some(&serde_json::Value::String("melee".into()))
        );
    }

    #[test]
    fn given_invalid_json_when_parsing_then_returns_parse_error() {
        let err = Dataset::from_json("{ nodes: ").unwrap_err();
        assert!(err.to_string().contains("dataset"));
    }

    #[test]
    fn test_stage_thresholds() {
        assert_eq!(Stage::from_principle_points(0), Stage::Novice);
        assert_eq!(Stage::from_principle_points(9), Stage::Novice);
        assert_eq!(Stage::from_principle_points(10), Stage::Expert);
        assert_eq!(Stage::from_principle_points(30), Stage::Expert);
        assert_eq!(Stage::from_principle_points(31), Stage::Master);
        assert!(Stage::Novice < Stage::Expert && Stage::Expert < Stage::Master);
        assert_eq!(Stage::Master.tier(), 3);
    }

    #[test]
    fn test_principle_tag_and_prerequisites() {
        let node = Node::new("x", 1)
            .with_tags(&["Gyo", "Ten"])
            .with_requires(&["a"])
            .with_requires_any(&["b", "c"]);

        assert!(node.is_principle_tagged());
        assert_eq!(node.prerequisites().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(node.depends_on("c"));
        assert!(!node.depends_on("x"));
    }
}
