//! Basic CLI E2E tests.
//!
//! Tests invoke the built `bipper` binary and verify its outputs. Every
//! test points `BIPPER_CONFIG_DIR` at its own temp directory.

use std::path::Path;
use std::process::{Command, Stdio};

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(config_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_bipper"))
        .args(args)
        .env("BIPPER_CONFIG_DIR", config_dir)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn write_doc(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("check"));
    assert!(stdout.contains("config"));
}

#[test]
fn test_check_lists_sections() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(
        dir.path(),
        "workout.toml",
        r#"
loop = true

[[sections]]
name = "Warmup"
duration = "1m30s"

[[sections]]
name = "Work"
duration = 45
"#,
    );
    let (code, stdout, stderr) = run_cli(dir.path(), &["check", &doc]);
    assert_eq!(code, 0, "check failed: {stderr}");
    assert!(stdout.contains("Warmup"));
    assert!(stdout.contains("1m30s"));
    assert!(stdout.contains("45s"));
    assert!(stdout.contains("2 sections, 2m15s total, looping"));
}

#[test]
fn test_check_json() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(
        dir.path(),
        "short.json",
        r#"{"sections": [{"name": "Warmup", "duration": "5s"}, {"name": "Work", "duration": 10}]}"#,
    );
    let (code, stdout, stderr) = run_cli(dir.path(), &["check", &doc, "--json"]);
    assert_eq!(code, 0, "check --json failed: {stderr}");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["total_secs"], 15);
    assert_eq!(parsed["document"]["loop"], false);
    assert_eq!(parsed["initial"]["state"], "idle");
    assert_eq!(parsed["initial"]["section_name"], "Warmup");
}

#[test]
fn test_check_rejects_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "empty.toml", "loop = false\n");
    let (code, _, stderr) = run_cli(dir.path(), &["check", &doc]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));
}

#[test]
fn test_check_rejects_bad_duration() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(
        dir.path(),
        "bad.toml",
        "[[sections]]\nname = \"Work\"\nduration = \"ten minutes\"\n",
    );
    let (code, _, stderr) = run_cli(dir.path(), &["check", &doc]);
    assert_eq!(code, 1);
    assert!(stderr.contains("ten minutes"));
}

#[test]
fn test_config_path_and_list() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));
    assert!(stdout.contains(&*dir.path().to_string_lossy()));

    let (code, stdout, _) = run_cli(dir.path(), &["config", "list"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["engine"]["warning_window_secs"], 3);
    assert_eq!(parsed["cues"]["enabled"], true);
}

#[test]
fn test_config_set_persists() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(
        dir.path(),
        &["config", "set", "engine.pause_lockout_secs", "5"],
    );
    assert_eq!(code, 0, "config set failed: {stderr}");
    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "engine.pause_lockout_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "5");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "engine.port_capacity", "0"]);
    assert_eq!(code, 1);
    let (code, _, _) = run_cli(dir.path(), &["config", "get", "cues.volume"]);
    assert_eq!(code, 1);
}

#[test]
fn test_run_json_plays_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(
        dir.path(),
        "tiny.toml",
        "[[sections]]\nname = \"Blink\"\nduration = 2\n",
    );
    let (code, stdout, stderr) = run_cli(dir.path(), &["run", &doc, "--silent", "--json"]);
    assert_eq!(code, 0, "run failed: {stderr}");

    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let totals: Vec<u64> = lines
        .iter()
        .filter(|l| l["port"] == "total_remaining")
        .map(|l| l["value"].as_u64().unwrap())
        .collect();
    assert_eq!(totals, vec![2, 1, 0]);
    assert!(lines
        .iter()
        .any(|l| l["port"] == "message" && l["value"] == "Section Blink is over"));

    let summary = lines.last().unwrap();
    assert_eq!(summary["outcome"], "completed");
    assert_eq!(summary["final"]["state"], "finished");
}

#[test]
fn test_check_yaml_document() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(
        dir.path(),
        "intervals.yaml",
        r#"
loop: false
sections:
  - name: Warmup
    duration: 5s
  - name: Work
    duration: 1m30s
"#,
    );
    let (code, stdout, stderr) = run_cli(dir.path(), &["check", &doc]);
    assert_eq!(code, 0, "check failed: {stderr}");
    assert!(stdout.contains("2 sections, 1m35s total"));
}
