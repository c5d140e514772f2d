//! Main CLI commands enum

use clap::Subcommand;

pub mod report;
pub mod run;

use report::*;
use run::*;

/// Top-level llm-eval commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a model against the prompt set and append one run
    Eval(EvalArgs),

    /// Rank models by composite score over their latest runs
    Compare(CompareArgs),

    /// Re-run the judge over stored responses
    Rejudge(RescoreArgs),

    /// Re-run the secondary scorer over stored responses
    Deepeval(RescoreArgs),

    /// List configured models and their recorded history
    Models,

    /// List prompts in the prompt set
    Prompts(PromptsArgs),

    /// Show every run recorded for a model
    History(HistoryArgs),
}
