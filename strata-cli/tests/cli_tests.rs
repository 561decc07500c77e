//! End-to-end tests for the `strata` binary.
//!
//! Each test runs the compiled binary against temporary directories and
//! checks exit codes, stdout payloads and the report files on disk.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn strata(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("should run strata binary")
}

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("path has a parent")).expect("should create dirs");
    fs::write(path, content).expect("should write file");
}

#[test]
fn test_config_validate_defaults_succeeds() {
    let output = strata(&["config", "validate"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("VALID"));
}

#[test]
fn test_config_validate_invalid_value_exits_with_config_code() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("strata.toml");
    fs::write(&config_path, "[scan]\nmax_concurrent_layers = 0\n").expect("should write config");

    let output = strata(&[
        "--config",
        config_path.to_str().expect("utf-8 path"),
        "config",
        "validate",
    ]);
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("INVALID"));
    assert!(stdout.contains("scan.max_concurrent_layers"));
}

#[test]
fn test_config_show_json_output() {
    let output = strata(&["--output", "json", "config", "show", "--section", "output"]);
    assert_eq!(output.status.code(), Some(0));
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["section"], "output");
    assert_eq!(parsed["config"]["output"]["spdx"], true);
}

#[test]
fn test_scan_writes_selected_reports() {
    let layer = TempDir::new().expect("should create layer dir");
    write_file(
        layer.path(),
        "app/node_modules/left-pad/package.json",
        r#"{"name":"left-pad","version":"1.3.0"}"#,
    );
    write_file(layer.path(), "app/node_modules/left-pad/index.js", "");
    write_file(layer.path(), "app/server.js", "");
    let out = TempDir::new().expect("should create output dir");

    let output = strata(&[
        "--output",
        "json",
        "scan",
        layer.path().to_str().expect("utf-8 path"),
        "--layer-id",
        "app",
        "--image",
        "demo:1.0",
        "--out",
        out.path().to_str().expect("utf-8 path"),
        "--csv",
    ]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["image"], "demo:1.0");
    assert_eq!(report["layers"][0]["id"], "app");
    assert_eq!(report["layers"][0]["total_files"], 3);
    assert_eq!(report["layers"][0]["remaining_files"], 1);

    let csv = fs::read_to_string(out.path().join("demotwodots1.0.csv")).expect("csv report");
    assert!(csv.starts_with("product,version,vendor"));
    assert!(csv.contains("left-pad,1.3.0"));
    assert!(out.path().join("demotwodots1.0.spdx.json").exists());
    assert!(out.path().join("demotwodots1.0.log.json").exists());
    assert!(!out.path().join("demotwodots1.0.json").exists());
}

#[test]
fn test_scan_missing_directory_exits_with_scan_code() {
    let out = TempDir::new().expect("should create output dir");
    let output = strata(&[
        "scan",
        "/nonexistent/strata/layer",
        "--out",
        out.path().to_str().expect("utf-8 path"),
    ]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no layer could be scanned"));
    assert!(fs::read_dir(out.path()).expect("out dir").next().is_none());
}

#[test]
fn test_scan_layer_id_mismatch_is_rejected() {
    let output = strata(&["scan", "/a", "/b", "--layer-id", "only"]);
    assert_eq!(output.status.code(), Some(1));
}
