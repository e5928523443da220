use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use gatehouse_core::config::{self, Config};
use gatehouse_core::TokenIdentity;

fn gatehouse_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gatehouse"));
    cmd.env("HOME", home).env("USERPROFILE", home);
    cmd
}

/// Config whose backends point at a port nothing listens on, so every
/// transport call fails fast with connection refused.
fn write_dead_backend_config(home: &Path) -> Config {
    let mut config = Config::default();
    config.store.base_url = "http://127.0.0.1:9/v1".to_string();
    config.sheet.base_url = "http://127.0.0.1:9/v4".to_string();
    config.sheet.spreadsheet_id = "sheet-test".to_string();
    config.resolver.fallback_base_url = "http://127.0.0.1:9/v1".to_string();
    config.resolver.primary_timeout_secs = 2;
    config::save_at(home, &config).expect("write config");
    config
}

#[test]
fn init_scaffolds_a_default_config() {
    let home = TempDir::new().expect("home");

    gatehouse_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Wrote"));

    let config = config::load_at(home.path()).expect("load config");
    assert_eq!(config.sheet.tab, "Employees");
    assert_eq!(config.store.collection, "whitelist");
    assert_eq!(config.resolver.primary_timeout_secs, 10);
    assert!(!config.sync.reconcile_deletes);
}

#[test]
fn repeated_init_preserves_operator_edits() {
    let home = TempDir::new().expect("home");
    gatehouse_cmd(home.path()).arg("init").assert().success();

    let mut config = config::load_at(home.path()).expect("load config");
    config.store.collection = "members".to_string();
    config::save_at(home.path(), &config).expect("save edit");

    gatehouse_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("already exists"));

    let reloaded = config::load_at(home.path()).expect("reload config");
    assert_eq!(reloaded.store.collection, "members");
}

#[test]
fn init_force_restores_the_defaults() {
    let home = TempDir::new().expect("home");
    gatehouse_cmd(home.path()).arg("init").assert().success();

    let mut config = config::load_at(home.path()).expect("load config");
    config.store.collection = "members".to_string();
    config::save_at(home.path(), &config).expect("save edit");

    gatehouse_cmd(home.path())
        .args(["init", "--force"])
        .assert()
        .success()
        .stdout(contains("Wrote"));

    let reloaded = config::load_at(home.path()).expect("reload config");
    assert_eq!(reloaded.store.collection, "whitelist");
}

#[test]
fn commands_without_config_point_at_init() {
    let home = TempDir::new().expect("home");

    for args in [
        vec!["status"],
        vec!["diff"],
        vec!["sync", "roster"],
        vec!["record", "list"],
    ] {
        gatehouse_cmd(home.path())
            .args(&args)
            .assert()
            .failure()
            .stderr(contains("gatehouse init"));
    }
}

#[test]
fn daemon_status_reports_not_running() {
    let home = TempDir::new().expect("home");

    gatehouse_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"));
}

#[test]
fn resolve_fails_closed_when_backends_are_unreachable() {
    let home = TempDir::new().expect("home");
    write_dead_backend_config(home.path());

    gatehouse_cmd(home.path())
        .args([
            "resolve",
            "--email",
            "ada@example.com",
            "--bearer",
            "tok-test",
            "--json",
        ])
        .assert()
        .success()
        .stdout(contains("\"authorized\": false"));
}

#[test]
fn resolve_without_email_uses_the_config_token_map() {
    let home = TempDir::new().expect("home");
    let mut config = write_dead_backend_config(home.path());
    config.tokens.insert(
        "tok-ada".to_string(),
        TokenIdentity {
            email: "ada@example.com".to_string(),
            display_name: Some("Ada Lovelace".to_string()),
            photo_url: None,
        },
    );
    config::save_at(home.path(), &config).expect("save tokens");

    // Known token: the identity resolves locally and is denied (dead store,
    // dead fallback), but the command itself succeeds.
    gatehouse_cmd(home.path())
        .args(["resolve", "--bearer", "tok-ada"])
        .assert()
        .success()
        .stdout(contains("not authorized"));

    // Unknown token: nothing can say who the caller is.
    gatehouse_cmd(home.path())
        .args(["resolve", "--bearer", "tok-unknown"])
        .assert()
        .failure()
        .stderr(contains("token map"));
}

#[test]
fn blank_emails_are_rejected_before_any_network_call() {
    let home = TempDir::new().expect("home");
    write_dead_backend_config(home.path());

    gatehouse_cmd(home.path())
        .args(["record", "remove", ""])
        .assert()
        .failure()
        .stderr(contains("email must not be empty"));

    gatehouse_cmd(home.path())
        .args(["record", "add", "  ", "--name", "Nobody"])
        .assert()
        .failure()
        .stderr(contains("email must not be empty"));
}

#[test]
fn avatar_set_requires_a_known_bearer() {
    let home = TempDir::new().expect("home");
    write_dead_backend_config(home.path());

    gatehouse_cmd(home.path())
        .args([
            "avatar",
            "set",
            "--bearer",
            "tok-unknown",
            "--url",
            "https://cdn.example.com/a.png",
        ])
        .assert()
        .failure()
        .stderr(contains("authentication required"));
}
