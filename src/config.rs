//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/skilltree/skilltree.toml`
//! 3. Local config: `<work_dir>/.skilltree.toml`
//! 4. Environment variables: `SKILLTREE_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::DEFAULT_STACKABLE_PATTERN;

/// Canvas used by the `layout` and `tree` commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Host viewport width (default: 1200)
    pub width: f64,
    /// Host viewport height (default: 700)
    pub height: f64,
    /// Usable fraction of the viewport (default: 0.9)
    pub margin: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 700.0,
            margin: 0.9,
        }
    }
}

impl LayoutConfig {
    /// Width and height actually handed to the layout engine.
    pub fn canvas(&self) -> (f64, f64) {
        (self.width * self.margin, self.height * self.margin)
    }
}

/// Raw layout config; `None` means "not specified, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawLayoutConfig {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub margin: Option<f64>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub dataset: Option<PathBuf>,
    pub build_file: Option<PathBuf>,
    pub stackable_pattern: Option<String>,
    #[serde(default)]
    pub layout: RawLayoutConfig,
}

/// Unified configuration for skilltree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Skill tree dataset (default: data/skills.json)
    pub dataset: PathBuf,
    /// Where the current build is persisted (default: build.json)
    pub build_file: PathBuf,
    /// Label regex marking nodes as stackable; empty disables inference
    pub stackable_pattern: String,
    /// Layout canvas
    pub layout: LayoutConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("data/skills.json"),
            build_file: PathBuf::from("build.json"),
            stackable_pattern: DEFAULT_STACKABLE_PATTERN.to_string(),
            layout: LayoutConfig::default(),
        }
    }
}

/// Get the XDG config directory for skilltree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "skilltree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("skilltree.toml"))
}

/// Get the path to the local config file in a working directory.
pub fn local_config_path(work_dir: &Path) -> PathBuf {
    work_dir.join(".skilltree.toml")
}

/// Expand `~`, `$VAR` and `${VAR}`; unexpandable input is returned as is.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `work_dir` - Optional directory holding a local `.skilltree.toml`
    ///
    /// Relative `dataset`/`build_file` paths are resolved by the caller
    /// against its working directory.
    pub fn load(work_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = work_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            dataset: overlay
                .dataset
                .clone()
                .unwrap_or_else(|| self.dataset.clone()),
            build_file: overlay
                .build_file
                .clone()
                .unwrap_or_else(|| self.build_file.clone()),
            stackable_pattern: overlay
                .stackable_pattern
                .clone()
                .unwrap_or_else(|| self.stackable_pattern.clone()),
            layout: LayoutConfig {
                width: overlay.layout.width.unwrap_or(self.layout.width),
                height: overlay.layout.height.unwrap_or(self.layout.height),
                margin: overlay.layout.margin.unwrap_or(self.layout.margin),
            },
        }
    }

    /// Apply SKILLTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("SKILLTREE").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("dataset") {
            settings.dataset = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("build_file") {
            settings.build_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("stackable_pattern") {
            settings.stackable_pattern = val;
        }
        if let Ok(val) = config.get_float("layout.width") {
            settings.layout.width = val;
        }
        if let Ok(val) = config.get_float("layout.height") {
            settings.layout.height = val;
        }
        if let Ok(val) = config.get_float("layout.margin") {
            settings.layout.margin = val;
        }

        Ok(settings)
    }

    fn expand_paths(&mut self) {
        self.dataset = expand_path(&self.dataset);
        self.build_file = expand_path(&self.build_file);
    }

    /// Reject values the layout engine cannot work with.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let layout = &self.layout;
        if !(layout.width.is_finite() && layout.width > 0.0)
            || !(layout.height.is_finite() && layout.height > 0.0)
        {
            return Err(ApplicationError::Config {
                message: format!(
                    "layout size must be positive, got {}x{}",
                    layout.width, layout.height
                ),
            });
        }
        if !(layout.margin > 0.0 && layout.margin <= 1.0) {
            return Err(ApplicationError::Config {
                message: format!("layout.margin must be in (0, 1], got {}", layout.margin),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# skilltree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/skilltree/skilltree.toml
#   Local:  ./.skilltree.toml
#   Env:    SKILLTREE_* environment variables (SKILLTREE_LAYOUT__WIDTH=1600)

# Skill tree dataset (JSON)
# dataset = "data/skills.json"

# Current build, read and written by every command
# build_file = "build.json"

# Labels matching this regex are bought level by level.
# Set to "" to rely on the explicit `stackable` flag only.
# stackable_pattern = '(?i)expans[aã]o\s+de\s+aura'

[layout]
# width = 1200
# height = 700
# Usable fraction of the canvas
# margin = 0.9
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
