//! Build persistence service
//!
//! A [`Session`] is the engine plus host-side state (manual positions) for
//! one command invocation. The build file carries it between invocations.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::services::DatasetService;
use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{BuildPayload, ImportReport, Point, RuleEngine};
use crate::infrastructure::traits::FileSystem;

/// Engine and host state for one invocation.
#[derive(Debug, Clone)]
pub struct Session {
    pub engine: RuleEngine,
    /// Manual positions, overriding the computed layout.
    pub positions: Option<BTreeMap<String, Point>>,
    /// Outcome of restoring the persisted build; default for a fresh one.
    pub restored: ImportReport,
}

impl Session {
    pub fn new(engine: RuleEngine) -> Self {
        Self {
            engine,
            positions: None,
            restored: ImportReport::default(),
        }
    }

    /// Snapshot including host positions.
    pub fn to_payload(&self) -> BuildPayload {
        BuildPayload {
            positions: self.positions.clone(),
            ..self.engine.export_build()
        }
    }

    /// Replace the selection with `payload`. Positions are taken over only
    /// when the payload carries them.
    pub fn apply(&mut self, payload: &BuildPayload) -> ImportReport {
        let report = self.engine.import_build(payload);
        if payload.positions.is_some() {
            self.positions = payload.positions.clone();
        }
        report
    }
}

/// Reads, writes, imports and exports builds.
pub struct BuildService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
    dataset_service: Arc<DatasetService>,
}

impl BuildService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        settings: Arc<Settings>,
        dataset_service: Arc<DatasetService>,
    ) -> Self {
        Self {
            fs,
            settings,
            dataset_service,
        }
    }

    /// Load the dataset and restore the persisted build, if any.
    #[instrument(level = "debug", skip(self))]
    pub fn open(&self) -> ApplicationResult<Session> {
        let engine = self.dataset_service.load_engine()?;
        let mut session = Session::new(engine);

        let path = &self.settings.build_file;
        if self.fs.is_file(path) {
            let payload = self.read_payload(path)?;
            session.restored = session.apply(&payload);
            if !session.restored.is_complete() {
                warn!(
                    dropped = ?session.restored.dropped,
                    stacks = ?session.restored.stack_shortfall,
                    "persisted build only partially restored"
                );
            }
        } else {
            debug!(path = %path.display(), "no persisted build, starting empty");
        }
        Ok(session)
    }

    /// Persist `session` to the configured build file.
    #[instrument(level = "debug", skip(self, session))]
    pub fn save(&self, session: &Session) -> ApplicationResult<()> {
        let path = &self.settings.build_file;
        self.write_payload(path, &session.to_payload())?;
        info!(path = %path.display(), spent = session.engine.points_spent(), "build saved");
        Ok(())
    }

    pub fn read_payload(&self, path: &Path) -> ApplicationResult<BuildPayload> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read build", path)?;
        Ok(BuildPayload::from_json(&content)?)
    }

    pub fn write_payload(&self, path: &Path, payload: &BuildPayload) -> ApplicationResult<()> {
        let json = payload.to_json()?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create directory for", path)?;
        self.fs
            .write(path, &json)
            .with_path_context("write build", path)
    }

    /// Import the build stored at `path` into `session`.
    #[instrument(level = "debug", skip(self, session))]
    pub fn import_file(&self, session: &mut Session, path: &Path) -> ApplicationResult<ImportReport> {
        let payload = self.read_payload(path)?;
        Ok(session.apply(&payload))
    }

    /// Export `session` as pretty JSON.
    pub fn export_json(&self, session: &Session) -> ApplicationResult<String> {
        Ok(session.to_payload().to_json()?)
    }
}
