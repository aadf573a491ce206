//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod build;
pub mod engine;
pub mod entities;
pub mod error;
pub mod layout;
pub mod stack;

pub use build::{BuildPayload, ImportReport};
pub use engine::{NodeStatus, RuleEngine, RuleResult, SelectionState};
pub use entities::*;
pub use error::{DomainError, ErrorKind, RuleError};
pub use layout::{Band, LayoutPlan, Point};
pub use stack::{StackablePredicate, DEFAULT_STACKABLE_PATTERN};
