use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn loopctl_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("loopctl");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/loop.sqlite"

[retrieval]
default_context_items = 5

[server]
bind = "127.0.0.1:7341"

[logging]
level = "warn"
"#,
        root.display()
    );

    let config_path = config_dir.join("loop.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_loopctl(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = loopctl_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("LLM_API_KEY")
        .env_remove("SLACK_BOT_TOKEN")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run loopctl binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_loopctl(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/loop.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_loopctl(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_loopctl(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_loopctl(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_context_list_on_empty_workspace() {
    let (_tmp, config_path) = setup_test_env();
    run_loopctl(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_loopctl(&config_path, &["context", "list", "ws1", "--type", "page"]);
    assert!(success, "list failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No context items."));
}

#[test]
fn test_context_list_rejects_unknown_type() {
    let (_tmp, config_path) = setup_test_env();
    run_loopctl(&config_path, &["init"]);

    let (_, stderr, success) =
        run_loopctl(&config_path, &["context", "list", "ws1", "--type", "galaxy"]);
    assert!(!success);
    assert!(stderr.contains("unknown context type"));
}

#[test]
fn test_context_build_unknown_workspace_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_loopctl(&config_path, &["init"]);

    let (_, stderr, success) = run_loopctl(&config_path, &["context", "build", "ws1", "workspace"]);
    assert!(!success);
    assert!(stderr.contains("No workspace"));
}

#[test]
fn test_search_requires_embeddings() {
    let (_tmp, config_path) = setup_test_env();
    run_loopctl(&config_path, &["init"]);

    let (_, stderr, success) = run_loopctl(&config_path, &["search", "ws1", "launch plan"]);
    assert!(!success);
    assert!(stderr.contains("requires embeddings"));
}

#[test]
fn test_ask_rejects_empty_query() {
    let (_tmp, config_path) = setup_test_env();
    run_loopctl(&config_path, &["init"]);

    let (_, stderr, success) = run_loopctl(&config_path, &["ask", "ws1", "u1", "  "]);
    assert!(!success);
    assert!(stderr.contains("query must not be empty"));
}

#[test]
fn test_ask_with_disabled_model_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_loopctl(&config_path, &["init"]);

    let (_, stderr, success) =
        run_loopctl(&config_path, &["ask", "ws1", "u1", "What is active?", "--mode", "dashboard"]);
    assert!(!success);
    assert!(stderr.contains("language model is disabled"));
}

#[test]
fn test_ask_rejects_unknown_mode() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) =
        run_loopctl(&config_path, &["ask", "ws1", "u1", "hello", "--mode", "galaxy"]);
    assert!(!success);
}
