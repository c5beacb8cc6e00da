//! Configuration precedence tests

use pam_bridge_config::{BridgeConfig, ConfigError, ConfigLoader, CONFIG_ENV};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join("pam_bridge.toml");
    fs::write(&config_path, content).unwrap();
    config_path
}

// ============================================================================
// File discovery
// ============================================================================

#[test]
#[serial]
fn test_config_env_points_at_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(
        temp_dir.path(),
        r#"
[application]
confdir = "/srv/pam.d"
"#,
    );

    env::set_var(CONFIG_ENV, &path);
    let config = ConfigLoader::new().load();
    env::remove_var(CONFIG_ENV);

    assert_eq!(config.unwrap().confdir(), Some(Path::new("/srv/pam.d")));
}

#[test]
#[serial]
fn test_config_env_missing_file_is_error() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var(CONFIG_ENV, temp_dir.path().join("nope.toml"));
    let result = ConfigLoader::new().load();
    env::remove_var(CONFIG_ENV);

    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
#[serial]
fn test_invalid_toml_reports_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[logging\nfilter = 1");

    match ConfigLoader::with_path(&path).load() {
        Err(ConfigError::TomlParseError { file, .. }) => assert_eq!(file, path),
        other => panic!("expected parse error, got {:?}", other),
    }
}

// ============================================================================
// Environment overrides
// ============================================================================

#[rstest]
#[case("PAM_BRIDGE_LOG", "trace")]
#[case("PAM_BRIDGE_CONFDIR", "/tmp/pam.d")]
#[case("PAM_BRIDGE_LIBRARY", "libpam.so.0")]
#[serial]
fn test_env_overrides_file(#[case] var: &str, #[case] value: &str) {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(
        temp_dir.path(),
        r#"
[library]
path = "/usr/lib/libpam.so"

[logging]
filter = "warn"

[application]
confdir = "/etc/pam.d"
"#,
    );

    env::set_var(var, value);
    let config = ConfigLoader::with_path(&path).load();
    env::remove_var(var);
    let config: BridgeConfig = config.unwrap();

    let actual = match var {
        "PAM_BRIDGE_LOG" => config.log_filter().to_string(),
        "PAM_BRIDGE_CONFDIR" => config.confdir().unwrap().display().to_string(),
        _ => config.library_path().unwrap().display().to_string(),
    };
    assert_eq!(actual, value);
}
