//! `llm-eval compare` command - rank models over their latest runs
//!
//! The population is the current prompt set narrowed by the filters. Models
//! named on the command line are always reported, even without history.

pub mod report;

use std::collections::{BTreeMap, HashSet};
use std::fs;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::commands::report::CompareArgs;
use crate::cli::OutputFormat;
use crate::commands::dispatch::command::CommandContext;
use crate::commands::dispatch::macros::trace_command;
use crate::commands::format;
use self::report::{output_human, render_markdown};
use llm_eval_core::compare::{
    flagged_prompts, prompt_details, rank, trend, FlaggedPrompt, PromptDetail, RankEntry,
    TrendPoint,
};
use llm_eval_core::error::{EvalError, Result};
use llm_eval_core::ledger::ModelResult;
use llm_eval_core::prompt::{PromptFilter, PromptSet};

/// Everything `compare` reports, in every output format
#[derive(Debug, Serialize)]
pub struct CompareReport {
    pub generated_at: DateTime<Utc>,
    pub filter: PromptFilter,
    /// Prompts in the population
    pub population: usize,
    /// Categories of the population, in prompt-set order
    pub categories: Vec<String>,
    pub ranking: Vec<RankEntry>,
    pub flagged: Vec<FlaggedPrompt>,
    /// Latest record of every model per prompt, models in ranking order
    pub details: Vec<PromptDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trends: Option<BTreeMap<String, Vec<TrendPoint>>>,
}

impl CompareReport {
    pub fn build(
        models: &[ModelResult],
        prompts: &PromptSet,
        filter: PromptFilter,
        with_history: bool,
    ) -> Self {
        let selected = prompts.filter(&filter);
        let mut seen = HashSet::new();
        let categories = selected
            .iter()
            .map(|p| p.category.clone())
            .filter(|c| seen.insert(c.clone()))
            .collect();

        let trends = with_history.then(|| {
            models
                .iter()
                .map(|m| (m.model_id.clone(), trend(m, prompts, &filter)))
                .collect()
        });

        let ranking = rank(models, prompts, &filter);
        let ranked_models: Vec<&ModelResult> = ranking
            .iter()
            .filter_map(|entry| models.iter().find(|m| m.model_id == entry.model_id))
            .collect();

        Self {
            generated_at: Utc::now(),
            population: selected.len(),
            categories,
            details: prompt_details(&ranked_models, prompts, &filter),
            ranking,
            flagged: flagged_prompts(models, prompts, &filter),
            trends,
            filter,
        }
    }
}

/// Execute the compare command
pub fn execute(ctx: &CommandContext, args: &CompareArgs) -> Result<()> {
    let prompts = ctx.prompt_set()?;
    let ledger = ctx.ledger()?;

    let model_ids = if args.models.is_empty() {
        ledger.list_models()?
    } else {
        args.models.clone()
    };
    if model_ids.is_empty() {
        return Err(EvalError::not_found("model history", ledger.dir().display()));
    }

    let models = model_ids
        .iter()
        .map(|id| ledger.load(id))
        .collect::<Result<Vec<_>>>()?;
    trace_command!(ctx.cli, ctx.start, "load_history");

    let report = CompareReport::build(&models, &prompts, args.filter.to_filter(), args.history);

    if let Some(path) = &args.save {
        fs::write(path, render_markdown(&report))?;
    }

    match ctx.cli.format {
        OutputFormat::Json => format::print_json(&report)?,
        OutputFormat::Human => {
            output_human(&report);
            if let (Some(path), false) = (&args.save, ctx.cli.quiet) {
                println!();
                println!("Report saved to {}", path.display());
            }
        }
    }
    Ok(())
}
