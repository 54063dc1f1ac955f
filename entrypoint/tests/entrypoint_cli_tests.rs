// End-to-end tests for the container entrypoint binary
//
// Each test runs the real entrypoint executable in a temporary working
// directory whose config/local.toml swaps the migrate and serve commands for
// shell stubs that leave marker files behind.

#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Output};

const ENTRYPOINT: &str = env!("CARGO_BIN_EXE_entrypoint");

fn write_config(dir: &Path, migrate: &str, serve: &str) {
    let config_dir = dir.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("local.toml"),
        format!(
            "[entrypoint]\n\
             migrate_command = [\"sh\", \"-c\", \"{migrate}\"]\n\
             serve_command = [\"sh\", \"-c\", \"{serve}\"]\n"
        ),
    )
    .unwrap();
}

fn run_entrypoint(dir: &Path, envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(ENTRYPOINT);
    cmd.current_dir(dir);
    cmd.env_remove("PORT").env_remove("UPLOAD_DIR");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to spawn entrypoint")
}

#[test]
fn failed_migration_prevents_service_start() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "exit 7", "touch served");

    let output = run_entrypoint(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Migration failed"), "stderr: {stderr}");
    assert!(
        !dir.path().join("served").exists(),
        "service must not start after failed migration"
    );
}

#[test]
fn migration_runs_before_service() {
    let dir = tempfile::tempdir().unwrap();
    // The serve stub fails unless the migration marker already exists
    write_config(dir.path(), "touch migrated", "test -f migrated && touch served");

    let output = run_entrypoint(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(dir.path().join("migrated").exists());
    assert!(dir.path().join("served").exists());
}

#[test]
fn port_env_overrides_default_and_reaches_service() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "true", "echo $PORT > port; echo $UPLOAD_DIR > upload_dir");

    let output = run_entrypoint(dir.path(), &[("PORT", "9100"), ("UPLOAD_DIR", "/data/up")]);
    assert_eq!(output.status.code(), Some(0));

    let port = std::fs::read_to_string(dir.path().join("port")).unwrap();
    assert_eq!(port.trim(), "9100");
    let upload_dir = std::fs::read_to_string(dir.path().join("upload_dir")).unwrap();
    assert_eq!(upload_dir.trim(), "/data/up");
}

#[test]
fn default_port_is_8000_when_env_is_unset() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "true", "echo $PORT > port");

    let output = run_entrypoint(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(0));

    let port = std::fs::read_to_string(dir.path().join("port")).unwrap();
    assert_eq!(port.trim(), "8000");
}

#[test]
fn entrypoint_exit_code_mirrors_service_exit() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "true", "exit 5");

    let output = run_entrypoint(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(5));
}
