//! Read-only reporting command argument structures

use std::path::PathBuf;

use clap::Args;

use crate::cli::args::FilterArgs;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Models to compare (default: every model with history)
    pub models: Vec<String>,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Also show the per-run trend for each model
    #[arg(long)]
    pub history: bool,

    /// Write the report as markdown to this path
    #[arg(long)]
    pub save: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PromptsArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Model whose runs to list
    pub model: String,
}
