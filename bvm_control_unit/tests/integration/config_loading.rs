//! Integration test: configuration loading from TOML files.

use std::io::Write;
use std::path::Path;

use bvm_common::config::ConfigError;
use bvm_control_unit::config::{load_config, load_config_from_str};
use tempfile::NamedTempFile;

use super::{run_for, started};

fn write_toml(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn shipped_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/bvm.toml");
    let config = load_config(&path).unwrap();
    assert_eq!(config.timing.servo_period_ms, 1);
    assert_eq!(config.respiration.tidal_volume_settings.len(), 6);
    assert_eq!(config.respiration.rate_settings.len(), 6);
}

#[test]
fn file_overrides_reach_the_runner() {
    let file = write_toml(
        r#"
[timing]
servo_period_ms = 1
control_period_ms = 20
ui_period_ms = 100

[respiration]
default_peak_pressure_limit = 30.0
"#,
    );
    let config = load_config(file.path()).unwrap();
    let (plant, mut runner) = started(&config);
    run_for(&plant, &mut runner, 0.1);

    let stats = runner.stats();
    assert_eq!(stats.control_ticks, 5);
    assert_eq!(stats.ui_ticks, 1);
    assert_eq!(runner.ventilator().peak_pressure_limit(), 30.0);
}

#[test]
fn invalid_file_is_rejected() {
    let file = write_toml("[homing]\nhoming_velocity = 0.5\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn malformed_file_is_parse_error() {
    let file = write_toml("[respiration\nrate_settings = [8.0]\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn oversized_table_is_rejected() {
    let err = load_config_from_str(
        "[respiration]\nrate_settings = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]\n",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}
