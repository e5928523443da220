//! Load/save safety and `init` behavior for `~/.gatehouse/config.yaml`.

use assert_fs::prelude::*;
use gatehouse_core::{config, Config, ConfigError};
use predicates::prelude::predicate;
use std::fs;

fn write_config_file(home: &assert_fs::TempDir, contents: &[u8]) {
    let dir = home.path().join(".gatehouse");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), contents).expect("write config");
}

// ---------------------------------------------------------------------------
// Load errors
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("config not found"));
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn corrupt_yaml_surfaces_the_file_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config_file(&home, b"store: [unclosed\n  :::\n");

    let err = config::load_at(home.path()).unwrap_err();
    let ConfigError::Parse { source, .. } = &err else {
        panic!("expected a parse error, got: {err}");
    };
    assert!(err.to_string().contains("config.yaml"), "got: {err}");
    assert!(
        !source.to_string().is_empty(),
        "the serde_yaml cause should say where parsing failed"
    );
}

#[test]
fn non_mapping_yaml_is_a_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_config_file(&home, b"- a list\n- not a config mapping\n");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// Save safety
// ---------------------------------------------------------------------------

#[test]
fn completed_save_leaves_no_tmp_behind() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &Config::default()).expect("save");

    let tmp = config::config_path_at(home.path()).with_file_name("config.yaml.tmp");
    assert!(!tmp.exists(), "a completed save renames its .tmp away");
}

#[test]
fn interrupted_save_never_clobbers_the_config() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &Config::default()).expect("save");

    let path = config::config_path_at(home.path());
    let before = fs::read(&path).expect("read saved config");

    // A crash after the tmp write but before the rename: the orphaned tmp
    // stays, the live file does not change.
    let tmp = path.with_file_name("config.yaml.tmp");
    fs::write(&tmp, b"half a config").expect("write orphan tmp");

    let after = fs::read(&path).expect("read live config");
    assert_eq!(before, after, "live config changed without a rename");
    assert!(tmp.exists());
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_yaml() {
    let home = assert_fs::TempDir::new().expect("tempdir");

    let (config, created) = config::init_at(home.path(), false).expect("init");
    assert!(created);
    assert_eq!(config.store.collection, "whitelist");

    home.child(".gatehouse/config.yaml").assert(predicate::path::exists());

    let contents = fs::read_to_string(config::config_path_at(home.path())).expect("read");
    let reparsed: Config = serde_yaml::from_str(&contents).expect("reparse what init wrote");
    assert_eq!(reparsed, config);

    // Bearer tokens live in this file, so it must not be group/world readable.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(config::config_path_at(home.path()))
            .expect("meta")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600, "config mode should be 0600, got {mode:o}");
    }
}

#[test]
fn init_preserves_edits() {
    let home = assert_fs::TempDir::new().expect("tempdir");

    let (mut config, _) = config::init_at(home.path(), false).expect("first init");
    config.tokens.insert(
        "tok-1".to_string(),
        gatehouse_core::config::TokenIdentity {
            email: "ops@example.com".to_string(),
            display_name: Some("Ops".to_string()),
            photo_url: None,
        },
    );
    config::save_at(home.path(), &config).expect("save");

    let (again, created) = config::init_at(home.path(), false).expect("second init");
    assert!(!created);
    assert_eq!(again.tokens.len(), 1, "re-init must not discard edits");
}
