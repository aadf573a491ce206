//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{BuildService, DatasetService, LayoutService};
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    pub dataset_service: Arc<DatasetService>,
    pub build_service: BuildService,
    pub layout_service: LayoutService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        let dataset_service = Arc::new(DatasetService::new(fs.clone(), settings.clone()));
        let build_service = BuildService::new(fs, settings.clone(), dataset_service.clone());
        let layout_service = LayoutService::new(settings.clone());

        Self {
            settings,
            dataset_service,
            build_service,
            layout_service,
        }
    }
}
