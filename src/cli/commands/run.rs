//! Arguments for commands that call models and write to the ledger

use clap::Args;

use crate::cli::args::FilterArgs;

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Model name as configured under `models`
    pub model: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Evaluate again even if the latest run already answered a prompt
    #[arg(long)]
    pub rerun: bool,
}

#[derive(Args, Debug)]
pub struct RescoreArgs {
    /// Model to rescore (default: every model with history)
    pub model: Option<String>,

    /// Only these prompt ids (repeatable or comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Recompute layers that already have a score
    #[arg(long)]
    pub force: bool,

    /// Rescore every run, not just the latest
    #[arg(long)]
    pub all_runs: bool,
}
