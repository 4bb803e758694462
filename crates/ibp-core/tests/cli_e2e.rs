//! End-to-end tests of the `ibp-core` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TWO_OBJECTS: &str = r#"{"objects": [
    {"obs": [[-2.1], [-1.9], [-2.0], [3.1], [2.9]], "true_labels": [0, 0, 0, 1, 1]},
    {"obs": [[3.0], [3.2], [-2.2]], "true_labels": [1, 1, 0]}
]}"#;

/// Temp workspace with config lookup pointed at empty directories.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(dir.path().join("data.json"), TWO_OBJECTS).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ibp-core").unwrap();
        cmd.env_remove("IBP_MODEL")
            .env_remove("IBP_SETTINGS")
            .env_remove("IBP_LOG")
            .env_remove("RUST_LOG")
            .env("IBP_CONFIG_DIR", self.path("config"))
            .env("XDG_CONFIG_HOME", self.path("config"))
            .env("XDG_DATA_HOME", self.path("data-home"))
            .arg("--log-level")
            .arg("off");
        cmd
    }

    fn run(&self, extra: &[&str]) -> assert_cmd::assert::Assert {
        self.cmd()
            .arg("run")
            .arg("--data")
            .arg(self.path("data.json"))
            .arg("--save-dir")
            .arg(self.path("stats"))
            .arg("--seed")
            .arg("11")
            .args(extra)
            .assert()
    }
}

fn stdout_json(assert: &assert_cmd::assert::Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("stdout is JSON")
}

fn checkpoint_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("ibphmm_stats_trial"))
        .collect();
    names.sort();
    names
}

#[test]
fn check_reports_layout() {
    let sb = Sandbox::new();
    let assert = sb
        .cmd()
        .args(["check", "--iterations", "5", "--data"])
        .arg(sb.path("data.json"))
        .assert()
        .success();
    let out = stdout_json(&assert);
    assert_eq!(out["valid"], true);
    assert_eq!(out["num_objects"], 2);
    assert_eq!(out["lengths"], serde_json::json!([5, 3]));
    assert_eq!(out["total_len"], 8);
    assert_eq!(out["has_true_labels"], true);
    assert_eq!(out["n_iter"], 5);
}

#[test]
fn run_persists_each_iteration() {
    let sb = Sandbox::new();
    let assert = sb.run(&["--iterations", "2", "--save-min", "1"]).success();
    let out = stdout_json(&assert);
    assert_eq!(out["status"], "completed");
    assert_eq!(out["iterations"], 2);
    assert_eq!(out["saved_iterations"], serde_json::json!([1, 2]));
    assert_eq!(out["total_len"], 8);
    assert_eq!(out["z_tot"].as_array().unwrap().len(), 8);

    assert_eq!(
        checkpoint_files(&sb.path("stats")),
        vec![
            "ibphmm_stats_trial0_iter000001.json",
            "ibphmm_stats_trial0_iter000002.json"
        ]
    );
    assert!(sb.path("stats").join("info_trial0.json").exists());
    assert!(sb.path("stats").join("initial_stats_trial0.json").exists());
}

#[test]
fn settings_file_supplies_iterations_and_trial() {
    let sb = Sandbox::new();
    let settings = sb.write("settings.toml", "trial = 4\nn_iter = 3\nsave_min = 2\n");
    let assert = sb
        .run(&["--settings", settings.to_str().unwrap()])
        .success();
    let out = stdout_json(&assert);
    assert_eq!(out["trial"], 4);
    assert_eq!(out["saved_iterations"], serde_json::json!([2, 3]));
}

#[test]
fn checkpoints_lists_and_verifies() {
    let sb = Sandbox::new();
    sb.run(&["--iterations", "3"]).success();

    let assert = sb
        .cmd()
        .args(["checkpoints", "--verify", "--save-dir"])
        .arg(sb.path("stats"))
        .assert()
        .success();
    let out = stdout_json(&assert);
    assert_eq!(out["verified"], true);
    let iterations: Vec<u64> = out["checkpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["iteration"].as_u64().unwrap())
        .collect();
    assert_eq!(iterations, vec![1, 2, 3]);
}

#[test]
fn tampered_checkpoint_fails_verification() {
    let sb = Sandbox::new();
    sb.run(&["--iterations", "1"]).success();
    let path = sb.path("stats").join("ibphmm_stats_trial0_iter000001.json");
    let mut doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    doc["payload"]["iteration"] = serde_json::json!(7);
    fs::write(&path, doc.to_string()).unwrap();

    sb.cmd()
        .args(["checkpoints", "--verify", "--save-dir"])
        .arg(sb.path("stats"))
        .assert()
        .code(13)
        .stderr(predicate::str::contains("integrity"));
}

#[test]
fn resume_continues_after_latest_checkpoint() {
    let sb = Sandbox::new();
    sb.run(&["--iterations", "2"]).success();

    let assert = sb.run(&["--iterations", "4", "--resume"]).success();
    let out = stdout_json(&assert);
    assert_eq!(out["saved_iterations"], serde_json::json!([3, 4]));
    assert_eq!(checkpoint_files(&sb.path("stats")).len(), 4);
}

#[test]
fn elapsed_timeout_cancels_with_interrupted_code() {
    let sb = Sandbox::new();
    let assert = sb
        .cmd()
        .args(["--timeout", "0", "run", "--iterations", "50", "--data"])
        .arg(sb.path("data.json"))
        .arg("--save-dir")
        .arg(sb.path("stats"))
        .assert()
        .code(1);
    let out = stdout_json(&assert);
    assert_eq!(out["status"], "cancelled");
    assert_eq!(out["iterations"], 0);
}

#[test]
fn missing_iteration_count_is_a_config_error() {
    let sb = Sandbox::new();
    sb.cmd()
        .args(["run", "--data"])
        .arg(sb.path("data.json"))
        .assert()
        .code(11);
}

#[test]
fn invalid_override_is_a_config_error() {
    let sb = Sandbox::new();
    sb.run(&["--iterations", "2", "--save-min", "0"])
        .code(11)
        .stderr(predicate::str::contains("save_min"));
}

#[test]
fn unsupported_observation_model_is_a_config_error() {
    let sb = Sandbox::new();
    let model = sb.write(
        "model.json",
        r#"{"schema_version": "1.0.0",
            "hmm": {"a_alpha": 1, "b_alpha": 1, "a_kappa": 10, "b_kappa": 1, "a_gamma": 1, "b_gamma": 1},
            "obs_model": {"type": "slds"}}"#,
    );
    sb.run(&["--iterations", "1", "--model", model.to_str().unwrap()])
        .code(11)
        .stderr(predicate::str::contains("slds"));
}

#[test]
fn model_schema_mismatch_is_a_version_error() {
    let sb = Sandbox::new();
    let model = sb.write(
        "model.json",
        r#"{"schema_version": "0.1.0",
            "hmm": {"a_alpha": 1, "b_alpha": 1, "a_kappa": 10, "b_kappa": 1, "a_gamma": 1, "b_gamma": 1},
            "obs_model": {"type": "gaussian", "dim": 1}}"#,
    );
    sb.run(&["--iterations", "1", "--model", model.to_str().unwrap()])
        .code(13);
}

#[test]
fn malformed_data_is_a_data_error() {
    let sb = Sandbox::new();
    sb.write("data.json", "{\"objects\": [");
    sb.run(&["--iterations", "1"]).code(12);
}

#[test]
fn wrong_dimension_is_a_data_error() {
    let sb = Sandbox::new();
    sb.write("data.json", r#"{"objects": [{"obs": [[1.0, 2.0], [0.5, 0.1]]}]}"#);
    sb.cmd()
        .args(["check", "--iterations", "1", "--data"])
        .arg(sb.path("data.json"))
        .assert()
        .code(12);
    sb.run(&["--iterations", "1"]).code(12);
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("ibp-core")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("checkpoints"));
}
