use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn rewind_ctl(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rewind-ctl"))
        .env("HOME", home)
        .env_remove("REWIND_CONFIG")
        .env_remove("REWIND_DAEMON_SOCKET")
        .args(args)
        .output()
        .expect("failed to run rewind-ctl")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn paths_edits_persist_to_default_config() {
    let home = TempDir::new().expect("temp HOME");

    let added = rewind_ctl(home.path(), &["paths", "add", "/opt/games/quake"]);
    assert!(added.status.success());
    assert!(stdout(&added).contains("added /opt/games/quake"));
    rewind_ctl(home.path(), &["paths", "add", "/opt/games/doom"]);

    let listed = rewind_ctl(home.path(), &["paths", "list"]);
    assert_eq!(stdout(&listed), "/opt/games/quake\n/opt/games/doom\n");

    let config = std::fs::read_to_string(home.path().join(".rewind").join("config.toml"))
        .expect("config written");
    assert!(config.contains("/opt/games/quake;/opt/games/doom"));

    let removed = rewind_ctl(home.path(), &["paths", "remove", "/opt/games/quake"]);
    assert!(removed.status.success());
    let missing = rewind_ctl(home.path(), &["paths", "remove", "/opt/games/quake"]);
    assert!(!missing.status.success());

    let cleared = rewind_ctl(home.path(), &["paths", "clear"]);
    assert!(stdout(&cleared).contains("cleared 1 path(s)"));
    assert_eq!(stdout(&rewind_ctl(home.path(), &["paths", "list"])), "");
}

#[test]
fn explicit_config_flag_overrides_default_location() {
    let home = TempDir::new().expect("temp HOME");
    let config = home.path().join("elsewhere.toml");
    let config_arg = config.to_string_lossy().into_owned();

    let added = rewind_ctl(
        home.path(),
        &["--config", &config_arg, "paths", "add", "/opt/a"],
    );
    assert!(added.status.success());
    assert!(config.exists());
    assert!(!home.path().join(".rewind").join("config.toml").exists());
}

#[test]
fn check_reports_absent_application() {
    let home = TempDir::new().expect("temp HOME");
    let output = rewind_ctl(home.path(), &["check", "/nonexistent/rewind-test-game"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "not running\n");

    let empty = rewind_ctl(home.path(), &["check"]);
    assert_eq!(empty.status.code(), Some(1));
    assert_eq!(stdout(&empty), "no monitored paths\n");
}

#[test]
fn event_without_daemon_fails() {
    let home = TempDir::new().expect("temp HOME");
    let output = rewind_ctl(home.path(), &["event", "saved"]);
    assert!(!output.status.success());

    let unknown = rewind_ctl(home.path(), &["event", "paused"]);
    assert_eq!(unknown.status.code(), Some(2));
}
