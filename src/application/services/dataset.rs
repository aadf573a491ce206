//! Dataset loading service
//!
//! Reads the skill tree dataset and builds a ready-to-use rule engine.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{Dataset, RuleEngine, StackablePredicate};
use crate::infrastructure::traits::FileSystem;

/// Loads datasets and constructs engines configured from settings.
pub struct DatasetService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl DatasetService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Parse the dataset at `path`.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<Dataset> {
        if !self.fs.is_file(path) {
            return Err(ApplicationError::DatasetNotFound(path.to_path_buf()));
        }
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read dataset", path)?;
        let dataset = Dataset::from_json(&content)?;
        debug!(
            nodes = dataset.nodes.len(),
            max_points = dataset.ruleset.max_points,
            "dataset loaded"
        );
        Ok(dataset)
    }

    /// Predicate built from `stackable_pattern`.
    pub fn stackable_predicate(&self) -> ApplicationResult<StackablePredicate> {
        StackablePredicate::from_pattern(&self.settings.stackable_pattern).map_err(|e| {
            ApplicationError::Config {
                message: format!("stackable_pattern: {e}"),
            }
        })
    }

    /// Engine over `dataset` with the configured stackable predicate.
    pub fn engine_for(&self, dataset: &Dataset) -> ApplicationResult<RuleEngine> {
        let predicate = self.stackable_predicate()?;
        Ok(RuleEngine::new(dataset)?.with_stackable_predicate(predicate))
    }

    /// Engine over the configured dataset file, with an empty selection.
    pub fn load_engine(&self) -> ApplicationResult<RuleEngine> {
        let dataset = self.load(&self.settings.dataset)?;
        self.engine_for(&dataset)
    }
}
