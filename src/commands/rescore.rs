//! `llm-eval rejudge` and `llm-eval deepeval` - rescore stored responses
//!
//! Each model is handled on its own thread and keeps its own outcome: one
//! model failing does not stop the others, but the command exits with the
//! first error after reporting everything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::cli::commands::run::RescoreArgs;
use crate::cli::OutputFormat;
use crate::commands::dispatch::command::CommandContext;
use crate::commands::dispatch::macros::trace_command;
use crate::commands::format;
use llm_eval_core::error::{EvalError, Result};
use llm_eval_core::eval::{Layer, RescoreOutcome, RescoreRequest, Rescorer};
use llm_eval_core::provider::{judge_for, scorer_for};

pub fn execute(ctx: &CommandContext, args: &RescoreArgs, layer: Layer) -> Result<()> {
    let config = ctx.config()?;
    let prompts = ctx.prompt_set()?;
    let ledger = ctx.ledger()?;

    let models = match &args.model {
        Some(model) => vec![model.clone()],
        None => ledger.list_models()?,
    };
    if models.is_empty() {
        return Err(EvalError::not_found("model history", ledger.dir().display()));
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        cancel_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Could not install Ctrl-C handler");
    }

    let mut rescorer =
        Rescorer::new(config.scoring, config.eval.retry_policy()).with_cancel_flag(cancel);
    rescorer = match layer {
        Layer::Judge => rescorer.with_judge(judge_for(config)?),
        Layer::Secondary => rescorer.with_scorer(scorer_for(config)?),
    };

    let request = RescoreRequest {
        layer,
        prompts: &prompts,
        prompt_ids: &args.ids,
        force: args.force,
        all_runs: args.all_runs,
    };
    let results = rescorer.rescore_models(&ledger, &models, request);
    trace_command!(ctx.cli, ctx.start, "rescore");

    let mut first_error = None;
    let mut outcomes = Vec::new();
    let mut failures = Vec::new();
    for (model_id, result) in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                failures.push(json!({
                    "model_id": model_id,
                    "type": e.error_type(),
                    "message": e.to_string(),
                }));
                // The first error is reported by main on exit
                if first_error.is_none() {
                    first_error = Some(e);
                } else if ctx.cli.format == OutputFormat::Human && !ctx.cli.quiet {
                    eprintln!("{}: {}", model_id, e);
                }
            }
        }
    }

    match ctx.cli.format {
        OutputFormat::Json => format::print_json(&json!({
            "layer": layer,
            "models": outcomes,
            "failed_models": failures,
        }))?,
        OutputFormat::Human => {
            for outcome in &outcomes {
                output_human(outcome);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn output_human(outcome: &RescoreOutcome) {
    println!(
        "{} [{}]: {} rescored, {} failed, {} skipped",
        outcome.model_id, outcome.layer, outcome.rescored, outcome.failed, outcome.skipped
    );
    if outcome.unknown_prompts > 0 {
        println!(
            "  {} records reference prompts missing from the prompt set",
            outcome.unknown_prompts
        );
    }
    for summary in &outcome.runs {
        if let Some(run_id) = &summary.run_id {
            println!(" run {}", run_id);
        }
        format::print_summary(summary);
    }
}
