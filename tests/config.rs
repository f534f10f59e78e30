// ABOUTME: Integration tests for settings discovery, validation and scaffolding.
// ABOUTME: Each test works in its own temp directory.

use stackpilot::config::{self, MethodSetting, Settings};
use stackpilot::error::Error;
use std::fs;
use std::time::Duration;

const FULL: &str = r#"
toolkit_stack_name: PlatformToolkit
polling:
  stabilize_interval: 1m
  monitor_interval: 250ms
  change_set_interval: 3s
rollback:
  max_iterations: 3
assets:
  concurrency: 8
account_cache:
  path: /var/cache/stackpilot/accounts.json
  max_entries: 50
deployment:
  method: direct
  rollback: false
  use_previous_parameters: false
"#;

#[test]
fn full_document_overrides_every_default() {
    let settings = Settings::from_yaml(FULL).unwrap();

    assert_eq!(settings.toolkit_stack_name, "PlatformToolkit");
    assert_eq!(settings.polling.stabilize_interval, Duration::from_secs(60));
    assert_eq!(settings.polling.monitor_interval, Duration::from_millis(250));
    assert_eq!(settings.polling.change_set_interval, Duration::from_secs(3));
    assert_eq!(settings.rollback.max_iterations, 3);
    assert_eq!(settings.assets.concurrency, 8);
    assert_eq!(
        settings.account_cache.resolved_path(),
        std::path::PathBuf::from("/var/cache/stackpilot/accounts.json")
    );
    assert_eq!(settings.account_cache.max_entries, 50);
    assert_eq!(settings.deployment.method, MethodSetting::Direct);
    assert!(!settings.deployment.rollback);
    assert!(!settings.deployment.use_previous_parameters);
}

#[test]
fn partial_sections_keep_their_other_defaults() {
    let settings = Settings::from_yaml("polling:\n  monitor_interval: 1s\n").unwrap();

    assert_eq!(settings.polling.monitor_interval, Duration::from_secs(1));
    assert_eq!(settings.polling.stabilize_interval, Duration::from_secs(5));
    assert_eq!(settings.deployment.method, MethodSetting::ChangeSet);
}

#[test]
fn invalid_values_are_rejected() {
    for (yaml, needle) in [
        ("toolkit_stack_name: '  '\n", "toolkit_stack_name"),
        ("assets:\n  concurrency: 0\n", "assets.concurrency"),
        ("rollback:\n  max_iterations: 0\n", "rollback.max_iterations"),
    ] {
        let err = Settings::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{yaml}: {err:?}");
        assert!(err.to_string().contains(needle), "{err}");
    }
}

#[test]
fn malformed_documents_are_yaml_errors() {
    assert!(matches!(
        Settings::from_yaml("polling:\n  monitor_interval: soon\n"),
        Err(Error::Yaml(_))
    ));
    assert!(matches!(
        Settings::from_yaml("assets:\n  parallel: 2\n"),
        Err(Error::Yaml(_))
    ));
}

#[test]
fn discovery_prefers_the_primary_file_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join(".stackpilot")).unwrap();
    fs::write(
        dir.path().join(".stackpilot/config.yml"),
        "toolkit_stack_name: Nested\n",
    )
    .unwrap();
    assert_eq!(
        Settings::discover(dir.path()).unwrap().toolkit_stack_name,
        "Nested"
    );

    fs::write(dir.path().join("stackpilot.yaml"), "toolkit_stack_name: Alt\n").unwrap();
    assert_eq!(Settings::discover(dir.path()).unwrap().toolkit_stack_name, "Alt");

    fs::write(dir.path().join("stackpilot.yml"), "toolkit_stack_name: Primary\n").unwrap();
    assert_eq!(
        Settings::discover(dir.path()).unwrap().toolkit_stack_name,
        "Primary"
    );
}

#[test]
fn discovery_without_a_file() {
    let dir = tempfile::tempdir().unwrap();

    let err = Settings::discover(dir.path()).unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound(ref path) if path == dir.path()));

    assert_eq!(
        Settings::discover_or_default(dir.path()).unwrap(),
        Settings::default()
    );
}

#[test]
fn discover_or_default_still_reports_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stackpilot.yml"), "rollback:\n  max_iterations: 0\n").unwrap();

    assert!(matches!(
        Settings::discover_or_default(dir.path()),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn init_writes_a_loadable_file_once() {
    let dir = tempfile::tempdir().unwrap();

    config::init_config(dir.path(), false).unwrap();
    let path = dir.path().join(config::CONFIG_FILENAME);
    assert_eq!(Settings::load(&path).unwrap(), Settings::default());

    fs::write(&path, "toolkit_stack_name: Edited\n").unwrap();
    let err = config::init_config(dir.path(), false).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
    assert!(err.to_string().starts_with("file already exists: "));
    assert_eq!(
        Settings::load(&path).unwrap().toolkit_stack_name,
        "Edited"
    );

    config::init_config(dir.path(), true).unwrap();
    assert_eq!(Settings::load(&path).unwrap(), Settings::default());
}
