//! `llm-eval history` command - every run recorded for one model

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::commands::report::HistoryArgs;
use crate::cli::OutputFormat;
use crate::commands::dispatch::command::CommandContext;
use crate::commands::format::{self, cell};
use llm_eval_core::error::{EvalError, Result};
use llm_eval_core::eval::RunSummary;
use llm_eval_core::ledger::Run;

#[derive(Debug, Serialize)]
struct RunRow<'a> {
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    api_model: Option<&'a str>,
    judge_model: Option<&'a str>,
    scorer_model: Option<&'a str>,
    prompt_set_fingerprint: Option<&'a str>,
    #[serde(flatten)]
    summary: RunSummary,
}

impl<'a> RunRow<'a> {
    fn new(model_id: &str, run: &'a Run) -> Self {
        Self {
            started_at: run.started_at,
            completed_at: run.completed_at,
            api_model: run.api_model.as_deref(),
            judge_model: run.judge_model.as_deref(),
            scorer_model: run.scorer_model.as_deref(),
            prompt_set_fingerprint: run.prompt_set_fingerprint.as_deref(),
            summary: RunSummary::from_records(model_id, Some(run.run_id.clone()), &run.records),
        }
    }
}

/// Execute the history command
pub fn execute(ctx: &CommandContext, args: &HistoryArgs) -> Result<()> {
    let ledger = ctx.ledger()?;
    let runs = ledger.history(&args.model)?;
    if runs.is_empty() {
        return Err(EvalError::not_found("history for model", &args.model));
    }

    let rows: Vec<RunRow<'_>> = runs.iter().map(|r| RunRow::new(&args.model, r)).collect();

    match ctx.cli.format {
        OutputFormat::Json => format::print_json(&rows),
        OutputFormat::Human => {
            output_human(&args.model, &rows);
            Ok(())
        }
    }
}

fn output_human(model_id: &str, rows: &[RunRow<'_>]) {
    println!("{} - {} runs", model_id, rows.len());
    println!(
        "{} {} {:>7} {:>7} {:>7}  JUDGE",
        cell("RUN", 32),
        cell("STARTED", 16),
        "RECORDS",
        "SCORED",
        "MEAN"
    );
    for row in rows {
        let run_id = row
            .summary
            .run_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();
        println!(
            "{} {} {:>7} {:>7} {:>7}  {}",
            cell(&run_id, 32),
            cell(&row.started_at.format("%Y-%m-%d %H:%M").to_string(), 16),
            row.summary.records,
            row.summary.composite.populated,
            format::score(row.summary.mean_composite),
            row.judge_model.unwrap_or("-")
        );
    }
}
