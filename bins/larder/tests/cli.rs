use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ENV_OVERRIDES: [&str; 5] = [
    "LARDER_CONFIG",
    "LARDER_REMOTE_URL",
    "LARDER_AUTH_TOKEN",
    "LARDER_DB_PATH",
    "LARDER_TIMEOUT_SECS",
];

fn larder() -> Command {
    let mut cmd = Command::cargo_bin("larder").unwrap();
    for var in ENV_OVERRIDES {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Config file in a temp dir with the database next to it
fn config(dir: &Path, remote: Option<&str>) -> PathBuf {
    let db = dir.join("cache.db").display().to_string();
    let mut content = format!("[store]\npath = {db:?}\n\n[store.collection]\nname = \"properties\"\n");
    if let Some(url) = remote {
        content.push_str(&format!("\n[remote]\nbase_url = {url:?}\ntimeout_secs = 2\n"));
    }
    let path = dir.join("larder.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    larder()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_list_empty_cache_as_json() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), None);

    larder()
        .args(["--config", cfg.to_str().unwrap(), "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    larder()
        .args(["--config", missing.to_str().unwrap(), "list"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_get_unknown_id() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), None);

    larder()
        .args(["--config", cfg.to_str().unwrap(), "get", "42"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no cached entity with id 42"));
}

#[test]
fn test_refresh_requires_remote() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), None);

    larder()
        .args(["--config", cfg.to_str().unwrap(), "refresh"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("remote.base_url"));
}

#[test]
fn test_refresh_unreachable_remote_is_network_error() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), Some("http://127.0.0.1:9"));

    larder()
        .args(["--config", cfg.to_str().unwrap(), "refresh"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("network"));
}

#[test]
fn test_status_json_without_remote() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), None);

    larder()
        .args(["--config", cfg.to_str().unwrap(), "status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"entities\": 0"))
        .stdout(predicate::str::contains("\"valid\": false"));
}

#[test]
fn test_watch_rejects_shrinking_backoff() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), Some("http://127.0.0.1:9"));
    let mut content = std::fs::read_to_string(&cfg).unwrap();
    content.push_str("\n[scheduler.retry]\nbackoff_multiplier = -2.0\n");
    std::fs::write(&cfg, content).unwrap();

    larder()
        .args(["--config", cfg.to_str().unwrap(), "watch"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("backoff_multiplier"));
}
