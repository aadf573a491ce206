//! Tests for layered settings loading

use std::path::PathBuf;

use tempfile::TempDir;

use skilltree::application::ApplicationError;
use skilltree::config::{expand_path, local_config_path, Settings};

fn write_local_config(dir: &TempDir, content: &str) {
    std::fs::write(local_config_path(dir.path()), content).expect("write config");
}

#[test]
fn given_local_config_when_loading_then_overrides_defaults() {
    // Arrange
    let temp = TempDir::new().unwrap();
    write_local_config(
        &temp,
        r#"
build_file = "saves/hunter.json"
stackable_pattern = ""

[layout]
width = 1600
"#,
    );

    // Act
    let settings = Settings::load(Some(temp.path())).unwrap();

    // Assert
    assert_eq!(settings.build_file, PathBuf::from("saves/hunter.json"));
    assert_eq!(settings.stackable_pattern, "");
    assert_eq!(settings.layout.width, 1600.0);
    assert_eq!(settings.layout.margin, 0.9);
}

#[test]
fn given_malformed_local_config_when_loading_then_config_error() {
    let temp = TempDir::new().unwrap();
    write_local_config(&temp, "dataset = [unclosed");

    let err = Settings::load(Some(temp.path())).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }));
    assert!(err.to_string().contains(".skilltree.toml"));
}

#[test]
fn given_invalid_layout_in_local_config_when_loading_then_rejected() {
    let temp = TempDir::new().unwrap();
    write_local_config(&temp, "[layout]\nheight = -10\n");

    assert!(Settings::load(Some(temp.path())).is_err());
}

#[test]
fn given_effective_settings_when_serializing_then_roundtrips_through_toml() {
    let settings = Settings::default();

    let rendered = settings.to_toml().unwrap();
    let parsed: Settings = toml::from_str(&rendered).unwrap();

    assert_eq!(parsed, settings);
}

#[test]
fn given_plain_relative_path_when_expanding_then_unchanged() {
    let path = PathBuf::from("data/skills.json");
    assert_eq!(expand_path(&path), path);
}
