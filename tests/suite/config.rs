//! Engine construction from configuration files.

use std::fs;

use tempfile::tempdir;
use warden_engine::{Action, ConfigError, Orchestrator, WardenConfig};

use crate::common::init_tracing;

#[tokio::test]
async fn file_settings_shape_the_engine() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r"
[constraints]
include_defaults = false

[protection]
default_layers = false

[health]
emergency_window_secs = 60
",
    )
    .unwrap();

    let config = WardenConfig::load_from(&path).unwrap();
    let mut engine = Orchestrator::new(config);

    assert!(engine.validator().constraints().is_empty());
    assert!(engine.protection().layer_names().is_empty());
    assert_eq!(engine.config().health.emergency_window_secs, 60);
    assert!(
        engine
            .submit_action(Action::new("delete_everything", "no rules loaded"))
            .await
            .accepted()
    );
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[reversibility]\nmax_attempts = \"three\"\n").unwrap();

    let err = WardenConfig::load_from(&path).unwrap_err();

    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), &path);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempdir().unwrap();
    let err = WardenConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
