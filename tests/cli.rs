//! CLI smoke tests for the commands that run without any API credentials.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn qag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("qag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_content = format!(
        r#"[store]
path = "{}/data/qag.sqlite"
collection = "test_docs"

[chunking]
max_bytes = 500
overlap_bytes = 100
"#,
        root.display()
    );

    let config_path = root.join("qag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_qag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = qag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run qag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_qag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/qag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_qag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_qag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_stats_on_fresh_database() {
    let (_tmp, config_path) = setup_test_env();

    run_qag(&config_path, &["init"]);
    let (stdout, stderr, success) = run_qag(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Collection: test_docs"));
    assert!(stdout.contains("Documents:  0"));
    assert!(stdout.contains("Chunks:     0"));
    assert!(stdout.contains("none"));
}

#[test]
fn test_reset_succeeds_on_fresh_database() {
    let (_tmp, config_path) = setup_test_env();

    run_qag(&config_path, &["init"]);
    let (stdout, _, success) = run_qag(&config_path, &["reset"]);
    assert!(success);
    assert!(stdout.contains("Cleared collection 'test_docs'"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("qag.toml");
    fs::write(
        &config_path,
        "[chunking]\nmax_bytes = 100\noverlap_bytes = 200\n",
    )
    .unwrap();

    let (_, stderr, success) = run_qag(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("overlap_bytes"));
}
