//! `llm-eval eval` command - evaluate one model and append a run
//!
//! Ctrl-C sets the cancellation flag: in-flight prompts finish, nothing is
//! appended, and the command exits with an `interrupted` error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::cli::commands::run::EvalArgs;
use crate::cli::OutputFormat;
use crate::commands::dispatch::command::CommandContext;
use crate::commands::dispatch::macros::trace_command;
use crate::commands::format;
use llm_eval_core::error::{EvalError, Result};
use llm_eval_core::eval::{EvalOutcome, EvalRequest, Evaluator};
use llm_eval_core::provider::{judge_for, provider_for, scorer_for};

/// Execute the eval command
pub fn execute(ctx: &CommandContext, args: &EvalArgs) -> Result<()> {
    let config = ctx.config()?;
    let model = config.model(&args.model)?;
    let prompts = ctx.prompt_set()?;
    let ledger = ctx.ledger()?;

    let filter = args.filter.to_filter();
    if prompts.filter(&filter).is_empty() {
        return Err(EvalError::not_found(
            "prompts matching filter",
            serde_json::to_string(&filter)?,
        ));
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        cancel_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Could not install Ctrl-C handler");
    }

    let evaluator = Evaluator::new(provider_for(config, &args.model)?)
        .with_judge(judge_for(config)?)
        .with_scorer(scorer_for(config)?)
        .with_params(model.params.clone())
        .with_api_model(&model.model)
        .with_weights(config.scoring)
        .with_settings(&config.eval)
        .with_cancel_flag(cancel);
    trace_command!(ctx.cli, ctx.start, "build_pipeline");

    let outcome = evaluator.evaluate(
        &ledger,
        EvalRequest {
            model_id: &args.model,
            prompts: &prompts,
            filter: &filter,
            rerun: args.rerun,
        },
    )?;
    trace_command!(ctx.cli, ctx.start, "evaluate");

    match ctx.cli.format {
        OutputFormat::Json => format::print_json(&json!({
            "model_id": args.model,
            "run_id": outcome.run_id,
            "skipped": outcome.skipped,
            "summary": outcome.summary,
        })),
        OutputFormat::Human => {
            output_human(ctx, &args.model, &outcome);
            Ok(())
        }
    }
}

fn output_human(ctx: &CommandContext, model_id: &str, outcome: &EvalOutcome) {
    let Some(run_id) = &outcome.run_id else {
        if !ctx.cli.quiet {
            println!(
                "{}: nothing to evaluate ({} prompts already answered; use --rerun to evaluate again)",
                model_id, outcome.skipped
            );
        }
        return;
    };

    println!(
        "{}: run {} ({} prompts evaluated)",
        model_id, run_id, outcome.summary.records
    );
    if outcome.skipped > 0 && !ctx.cli.quiet {
        println!("  skipped {} already-answered prompts", outcome.skipped);
    }
    format::print_summary(&outcome.summary);
}
