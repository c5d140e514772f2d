//! `llm-eval models` command - configured models and recorded history

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::dispatch::command::CommandContext;
use crate::commands::format::{self, cell};
use llm_eval_core::error::Result;
use llm_eval_core::ledger::RunId;

#[derive(Debug, Serialize)]
struct ModelRow {
    model_id: String,
    configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_model: Option<String>,
    runs: usize,
    latest_run: Option<RunId>,
    latest_at: Option<DateTime<Utc>>,
}

/// Execute the models command
pub fn execute(ctx: &CommandContext) -> Result<()> {
    let config = ctx.config()?;
    let ledger = ctx.ledger()?;

    let mut ids: BTreeSet<String> = config.models.keys().cloned().collect();
    ids.extend(ledger.list_models()?);

    let mut rows = Vec::with_capacity(ids.len());
    for model_id in ids {
        let history = ledger.load(&model_id)?;
        let configured = config.models.get(&model_id);
        let latest = history.latest_run();
        rows.push(ModelRow {
            configured: configured.is_some(),
            provider: configured.map(|m| m.provider.as_str()),
            api_model: configured.map(|m| m.model.clone()),
            runs: history.runs.len(),
            latest_run: latest.map(|r| r.run_id.clone()),
            latest_at: latest.map(|r| r.completed_at),
            model_id,
        });
    }

    match ctx.cli.format {
        OutputFormat::Json => format::print_json(&rows),
        OutputFormat::Human => {
            output_human(ctx, &rows);
            Ok(())
        }
    }
}

fn output_human(ctx: &CommandContext, rows: &[ModelRow]) {
    if rows.is_empty() {
        if !ctx.cli.quiet {
            println!("No models configured");
        }
        return;
    }

    println!(
        "{} {} {} {:>4}  LATEST",
        cell("MODEL", 24),
        cell("PROVIDER", 10),
        cell("API MODEL", 28),
        "RUNS"
    );
    for row in rows {
        let latest = row
            .latest_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {} {} {:>4}  {}",
            cell(&row.model_id, 24),
            cell(row.provider.unwrap_or("-"), 10),
            cell(row.api_model.as_deref().unwrap_or("(not configured)"), 28),
            row.runs,
            latest
        );
    }
}
