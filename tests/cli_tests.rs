//! Integration tests for the llm-eval CLI surface: help, configuration and
//! prompt-set errors, error envelopes, and the read-only listing commands.

#[path = "support/mod.rs"]
mod support;

use predicates::prelude::*;
use std::fs;
use support::{full_config, llm_eval, stderr_json, stdout_json, Workspace};

const UNUSED_URL: &str = "http://127.0.0.1:9/v1";

// ============================================================================
// Help and version
// ============================================================================

#[test]
fn test_help_lists_commands() {
    llm_eval()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: llm-eval"))
        .stdout(predicate::str::contains("eval"))
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("rejudge"))
        .stdout(predicate::str::contains("deepeval"));
}

#[test]
fn test_version_flag() {
    llm_eval()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("llm-eval"));
}

#[test]
fn test_no_command_prints_hint() {
    llm_eval()
        .assert()
        .success()
        .stdout(predicate::str::contains("llm-eval --help"));
}

// ============================================================================
// Error handling and exit codes
// ============================================================================

#[test]
fn test_missing_config_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    llm_eval()
        .current_dir(dir.path())
        .args(["eval", "m1"])
        .assert()
        .code(2)
        .stderr(predicate::str::starts_with("error: invalid configuration"));
}

#[test]
fn test_missing_config_json_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let output = llm_eval()
        .current_dir(dir.path())
        .args(["--format", "json", "models"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    let error = stderr_json(&output);
    assert_eq!(error["error"]["code"], 2);
    assert_eq!(error["error"]["type"], "config_error");
}

#[test]
fn test_parse_error_json_envelope() {
    let output = llm_eval().args(["--format", "json", "eval"]).output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let error = stderr_json(&output);
    assert_eq!(error["error"]["type"], "usage_error");
}

#[test]
fn test_quiet_suppresses_error_text() {
    let dir = tempfile::tempdir().unwrap();
    llm_eval()
        .current_dir(dir.path())
        .args(["--quiet", "models"])
        .assert()
        .code(2)
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_config_env_var_is_honored() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    let elsewhere = tempfile::tempdir().unwrap();
    llm_eval()
        .current_dir(elsewhere.path())
        .env("LLM_EVAL_CONFIG", ws.path("config.yaml"))
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("stub-m1"));
}

#[test]
fn test_weights_must_sum_to_one() {
    let config = full_config(UNUSED_URL).replace("secondary_weight: 0.5", "secondary_weight: 0.7");
    let ws = Workspace::new(&config);
    ws.cmd()
        .arg("models")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("weight"));
}

#[test]
fn test_judge_must_reference_configured_model() {
    let config = full_config(UNUSED_URL).replace("  model: judge\n", "  model: nobody\n");
    let ws = Workspace::new(&config);
    ws.cmd().arg("models").assert().code(2);
}

#[test]
fn test_unknown_check_type_is_data_error() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    fs::write(
        ws.path("prompts.json"),
        r#"{"prompts": [{"id": "X1", "prompt": "hi", "check_type": "vibes"}]}"#,
    )
    .unwrap();

    let output = ws
        .cmd()
        .args(["--format", "json", "prompts"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(stderr_json(&output)["error"]["type"], "unknown_check_type");
}

#[test]
fn test_missing_checker_param_is_data_error() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    fs::write(
        ws.path("prompts.json"),
        r#"{"prompts": [{"id": "W9", "prompt": "write", "check_type": "word_count"}]}"#,
    )
    .unwrap();

    ws.cmd()
        .arg("prompts")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("target_words"));
}

#[test]
fn test_eval_unknown_model_is_not_found() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    ws.cmd()
        .args(["eval", "gpt-9"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("model not found: gpt-9"));
}

#[test]
fn test_eval_filter_matching_nothing_is_not_found() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    ws.cmd()
        .args(["eval", "m1", "--ids", "NOPE"])
        .assert()
        .code(3);
    assert!(!ws.path("results").join("m1.json").exists());
}

#[test]
fn test_history_without_runs_is_not_found() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    ws.cmd().args(["history", "m1"]).assert().code(3);
}

// ============================================================================
// prompts / models
// ============================================================================

#[test]
fn test_prompts_lists_set() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    ws.cmd()
        .arg("prompts")
        .assert()
        .success()
        .stdout(predicate::str::contains("R01"))
        .stdout(predicate::str::contains("word_count"))
        .stdout(predicate::str::contains("3 of 3 prompts"));
}

#[test]
fn test_prompts_filter_is_case_insensitive() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    let output = ws
        .cmd()
        .args(["--format", "json", "prompts", "--category", "writing"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let prompts = stdout_json(&output);
    let ids: Vec<&str> = prompts
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["W01"]);
    assert_eq!(prompts[0]["target_words"], 200);
}

#[test]
fn test_prompts_override_path() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    fs::write(
        ws.path("other.yaml"),
        "prompts:\n  - id: Y1\n    category: Misc\n    prompt: hello\n",
    )
    .unwrap();

    ws.cmd()
        .args(["prompts", "--prompts", "other.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Y1"))
        .stdout(predicate::str::contains("R01").not());
}

#[test]
fn test_models_lists_configured_models() {
    let ws = Workspace::new(&full_config(UNUSED_URL));
    let output = ws
        .cmd()
        .args(["--format", "json", "models"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let models = stdout_json(&output);
    let m1 = models
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["model_id"] == "m1")
        .unwrap();
    assert_eq!(m1["configured"], true);
    assert_eq!(m1["provider"], "openai");
    assert_eq!(m1["api_model"], "stub-m1");
    assert_eq!(m1["runs"], 0);
    assert!(m1["latest_run"].is_null());
}
