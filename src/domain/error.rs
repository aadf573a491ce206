//! Domain-level errors (no external dependencies)

use serde::Serialize;
use thiserror::Error;

use crate::domain::entities::Stage;

/// Closed set of reasons an engine operation can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NodeNotFound,
    AlreadyActive,
    InsufficientPoints,
    MissingRequiredAll,
    MissingRequiredAny,
    StageTooLow,
    NotActive,
    DependencyExists,
    InvalidDataset,
}

/// Rejection of a rule engine operation.
///
/// Rejections never leave partial effects behind: the selection is exactly
/// as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("already acquired: {0}")]
    AlreadyActive(String),

    #[error("insufficient points for {id}: needs {needed}, {remaining} left")]
    InsufficientPoints {
        id: String,
        needed: u32,
        remaining: u32,
    },

    #[error("missing requirements for {id}: {}", missing.join(", "))]
    MissingRequiredAll { id: String, missing: Vec<String> },

    #[error("{id} requires one of: {}", options.join(" or "))]
    MissingRequiredAny { id: String, options: Vec<String> },

    #[error("{id} requires stage {required} (current: {current})")]
    StageTooLow {
        id: String,
        required: Stage,
        current: Stage,
    },

    #[error("node is not active: {0}")]
    NotActive(String),

    #[error("{dependent} depends on {id}")]
    DependencyExists { id: String, dependent: String },

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
}

impl RuleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuleError::NodeNotFound(_) => ErrorKind::NodeNotFound,
            RuleError::AlreadyActive(_) => ErrorKind::AlreadyActive,
            RuleError::InsufficientPoints { .. } => ErrorKind::InsufficientPoints,
            RuleError::MissingRequiredAll { .. } => ErrorKind::MissingRequiredAll,
            RuleError::MissingRequiredAny { .. } => ErrorKind::MissingRequiredAny,
            RuleError::StageTooLow { .. } => ErrorKind::StageTooLow,
            RuleError::NotActive(_) => ErrorKind::NotActive,
            RuleError::DependencyExists { .. } => ErrorKind::DependencyExists,
            RuleError::InvalidDataset(_) => ErrorKind::InvalidDataset,
        }
    }
}

/// Domain errors raised while turning documents into domain values.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("cannot parse {what}: {message}")]
    Parse { what: &'static str, message: String },
}
