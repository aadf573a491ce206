//! Errors at the process boundary: dataset and build file access, CLI I/O

use thiserror::Error;

use crate::application::ApplicationError;

/// Failures outside the engine: service errors while loading the dataset or
/// saving a build, and raw I/O such as writing a config template or help text.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl InfraError {
    /// I/O failure, `context` naming the file or stream involved.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
