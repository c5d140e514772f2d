//! End-to-end tests for eval, history, compare, rejudge and deepeval
//!
//! Every model, including the judge and the secondary scorer, is served by a
//! local stub. With the default stub replies each answered record scores
//! judge 4 (0.75) and secondary {0.8, 0.9} (0.85), so composite is 0.80.

#[path = "support/mod.rs"]
mod support;

use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use support::{chat, default_reply, stdout_json, StubServer, Workspace};

fn records(ledger: &Value, run: usize) -> &Vec<Value> {
    ledger["runs"][run]["records"].as_array().unwrap()
}

fn assert_close(value: &Value, expected: f64) {
    let actual = value.as_f64().unwrap();
    assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
}

// ============================================================================
// eval
// ============================================================================

#[test]
fn test_eval_appends_one_scored_run() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);

    ws.cmd()
        .args(["eval", "m1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("m1: run run-"))
        .stdout(predicate::str::contains("composite"));

    let ledger = ws.ledger("m1");
    assert_eq!(ledger["model_id"], "m1");
    assert_eq!(ledger["runs"].as_array().unwrap().len(), 1);

    let run = &ledger["runs"][0];
    assert_eq!(run["judge_model"], "judge");
    assert_eq!(run["scorer_model"], "scorer");
    assert_eq!(run["api_model"], "stub-m1");
    assert_eq!(run["prompt_set_fingerprint"].as_str().unwrap().len(), 64);

    let ids: Vec<&str> = records(&ledger, 0)
        .iter()
        .map(|r| r["prompt_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["R01", "R02", "W01"]);
    for record in records(&ledger, 0) {
        assert_eq!(record["response"]["content"], "The answer is 42.");
        assert_eq!(record["judge"]["score"], 4);
        assert_close(&record["composite_score"], 0.80);
    }
    assert!(!ws.path("results").join("m1.lock").exists());
}

#[test]
fn test_eval_flags_reach_the_record() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");

    let ledger = ws.ledger("m1");
    let w01 = records(&ledger, 0)
        .iter()
        .find(|r| r["prompt_id"] == "W01")
        .unwrap();
    assert_eq!(w01["check_result"]["passed"], false);
    assert_eq!(w01["check_result"]["flags"][0], "TOO_SHORT");
}

#[test]
fn test_eval_json_summary() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);

    let output = ws
        .cmd()
        .args(["--format", "json", "eval", "m1", "--category", "reasoning"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let body = stdout_json(&output);
    assert_eq!(body["model_id"], "m1");
    assert!(body["run_id"].as_str().unwrap().starts_with("run-"));
    let summary = &body["summary"];
    assert_eq!(summary["records"], 2);
    assert_eq!(summary["response"]["populated"], 2);
    assert_eq!(summary["judge"]["populated"], 2);
    assert_eq!(summary["secondary"]["populated"], 2);
    assert_eq!(summary["composite"]["unavailable"], 0);
    assert_eq!(summary["flagged"], 0);
    assert_close(&summary["mean_composite"], 0.80);
}

#[test]
fn test_eval_skips_answered_prompts_unless_rerun() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");
    let after_first = server.requests();

    ws.cmd()
        .args(["eval", "m1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to evaluate"));
    assert_eq!(server.requests(), after_first);
    assert_eq!(ws.ledger("m1")["runs"].as_array().unwrap().len(), 1);

    for _ in 0..2 {
        ws.cmd().args(["eval", "m1", "--rerun"]).assert().success();
    }
    let ledger = ws.ledger("m1");
    assert_eq!(ledger["runs"].as_array().unwrap().len(), 3);
    assert_eq!(records(&ledger, 2).len(), 3);
}

#[test]
fn test_failed_provider_still_appends_run() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);

    let output = ws
        .cmd()
        .args(["--format", "json", "eval", "broken"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary = &stdout_json(&output)["summary"];
    assert_eq!(summary["response"]["unavailable"], 3);
    assert_eq!(summary["composite"]["unavailable"], 3);
    assert!(summary["mean_composite"].is_null());

    let ledger = ws.ledger("broken");
    for record in records(&ledger, 0) {
        assert!(record.get("response").is_none());
        assert!(record.get("composite_score").is_none());
        assert!(record["errors"]["response"]
            .as_str()
            .unwrap()
            .contains("authentication failed"));
    }
}

#[test]
fn test_malformed_judge_output_leaves_judge_unavailable() {
    fn reply(request: &Value) -> (u16, Value) {
        match request["model"].as_str() {
            Some("stub-judge") => (200, chat("I would give this a solid four.")),
            _ => default_reply(request),
        }
    }
    let server = StubServer::start(reply);
    let ws = Workspace::with_stub(&server);
    ws.cmd().args(["eval", "m1", "--ids", "R01"]).assert().success();

    let ledger = ws.ledger("m1");
    let record = &records(&ledger, 0)[0];
    assert!(record.get("judge").is_none());
    assert!(record["errors"]["judge"].is_string());
    // Weight shifts entirely onto the secondary layer
    assert_close(&record["composite_score"], 0.85);
}

// ============================================================================
// history
// ============================================================================

#[test]
fn test_history_lists_runs_in_order() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");
    ws.cmd().args(["eval", "m1", "--rerun"]).assert().success();

    let output = ws
        .cmd()
        .args(["--format", "json", "history", "m1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let runs = stdout_json(&output);
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 2);

    let ledger = ws.ledger("m1");
    assert_eq!(runs[1]["run_id"], ledger["runs"][1]["run_id"]);
    assert_eq!(runs[1]["records"], 3);
    assert_eq!(runs[1]["judge_model"], "judge");

    ws.cmd()
        .args(["history", "m1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("m1 - 2 runs"));
}

#[test]
fn test_models_reports_run_counts() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");

    let output = ws
        .cmd()
        .args(["--format", "json", "models"])
        .output()
        .unwrap();
    let models = stdout_json(&output);
    let m1 = models
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["model_id"] == "m1")
        .unwrap();
    assert_eq!(m1["runs"], 1);
    assert!(m1["latest_run"].as_str().unwrap().starts_with("run-"));
}

// ============================================================================
// compare
// ============================================================================

#[test]
fn test_compare_ranks_missing_model_last() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");

    let output = ws
        .cmd()
        .args(["--format", "json", "compare", "m2", "m1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["population"], 3);
    let ranking = report["ranking"].as_array().unwrap();
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0]["model_id"], "m1");
    assert_close(&ranking[0]["mean_composite"], 0.80);
    assert_eq!(ranking[0]["scored"], 3);
    assert_eq!(ranking[1]["model_id"], "m2");
    assert!(ranking[1]["mean_composite"].is_null());

    let flagged = report["flagged"].as_array().unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0]["prompt_id"], "W01");
    assert!(report.get("trends").is_none());
}

#[test]
fn test_compare_defaults_to_models_with_history() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");
    ws.eval("m2");

    ws.cmd()
        .arg("compare")
        .assert()
        .success()
        .stdout(predicate::str::contains("Leaderboard (3 prompts)"))
        .stdout(predicate::str::contains("m1"))
        .stdout(predicate::str::contains("m2"))
        .stdout(predicate::str::contains("Notable flags"))
        .stdout(predicate::str::contains("TOO_SHORT"));
}

#[test]
fn test_compare_save_and_history() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");
    ws.cmd().args(["eval", "m1", "--rerun"]).assert().success();

    ws.cmd()
        .args(["compare", "m1", "--history", "--save", "report.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("History: m1"))
        .stdout(predicate::str::contains("Report saved to report.md"));

    let markdown = fs::read_to_string(ws.path("report.md")).unwrap();
    assert!(markdown.starts_with("# Model comparison"));
    assert!(markdown.contains("| 1 | m1 | 0.800 |"));
    assert!(markdown.contains("## By category"));
    assert!(markdown.contains("### m1"));
}

#[test]
fn test_compare_save_includes_judge_rationale() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");

    ws.cmd()
        .args(["--quiet", "compare", "m1", "--save", "report.md"])
        .assert()
        .success();

    let markdown = fs::read_to_string(ws.path("report.md")).unwrap();
    assert!(markdown.contains("## Per-prompt detail"));
    assert!(markdown.contains("### R01 (Reasoning / easy)"));
    assert!(markdown.contains("- **m1**: judge 4/5, composite 0.800 - Correct and clear."));
    assert!(markdown.contains(
        "### W01 (Writing / medium)\n\n- **m1**: judge 4/5, composite 0.800 [TOO_SHORT] - Correct and clear."
    ));
}

#[test]
fn test_compare_filter_narrows_population() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");

    let output = ws
        .cmd()
        .args(["--format", "json", "compare", "m1", "--difficulty", "HARD"])
        .output()
        .unwrap();
    let report = stdout_json(&output);
    assert_eq!(report["population"], 1);
    assert_eq!(report["ranking"][0]["matched"], 1);
    assert_eq!(report["categories"][0], "Reasoning");
}

// ============================================================================
// rejudge / deepeval
// ============================================================================

#[test]
fn test_rejudge_skips_scored_records_unless_forced() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");

    let output = ws
        .cmd()
        .args(["--format", "json", "rejudge", "m1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let body = stdout_json(&output);
    assert_eq!(body["layer"], "judge");
    assert_eq!(body["models"][0]["rescored"], 0);
    assert_eq!(body["models"][0]["skipped"], 3);

    let output = ws
        .cmd()
        .args(["--format", "json", "rejudge", "m1", "--force", "--ids", "R01"])
        .output()
        .unwrap();
    let body = stdout_json(&output);
    assert_eq!(body["models"][0]["rescored"], 1);

    // Still one run; the record was patched in place
    let ledger = ws.ledger("m1");
    assert_eq!(ledger["runs"].as_array().unwrap().len(), 1);
    assert_close(&records(&ledger, 0)[0]["composite_score"], 0.80);
}

#[test]
fn test_deepeval_fills_missing_secondary() {
    let server = StubServer::start(default_reply);
    let config = support::full_config(&server.base_url).replace(
        "secondary:\n  model: scorer\n  metrics: [correctness, coherence]\n",
        "",
    );
    let ws = Workspace::new(&config);
    ws.eval("m1");
    assert_close(&records(&ws.ledger("m1"), 0)[0]["composite_score"], 0.75);

    // Re-enable the scorer and fill the layer in
    fs::write(ws.path("config.yaml"), support::full_config(&server.base_url)).unwrap();
    ws.cmd()
        .arg("deepeval")
        .assert()
        .success()
        .stdout(predicate::str::contains("m1 [secondary]: 3 rescored"));

    let ledger = ws.ledger("m1");
    for record in records(&ledger, 0) {
        assert_eq!(record["secondary"]["scorer"], "scorer");
        assert_close(&record["composite_score"], 0.80);
    }
}

#[test]
fn test_deepeval_without_scorer_is_config_error() {
    let server = StubServer::start(default_reply);
    let config = support::full_config(&server.base_url).replace(
        "secondary:\n  model: scorer\n  metrics: [correctness, coherence]\n",
        "",
    );
    let ws = Workspace::new(&config);
    ws.eval("m1");

    ws.cmd().args(["deepeval", "m1"]).assert().code(2);
}

#[test]
fn test_rejudge_unknown_model_is_not_found() {
    let server = StubServer::start(default_reply);
    let ws = Workspace::with_stub(&server);
    ws.eval("m1");

    ws.cmd().args(["rejudge", "ghost"]).assert().code(3);
}
