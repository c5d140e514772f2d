//! CLI argument parsing for llm-eval
//!
//! Global flags: --config, --results, --prompts, --format, --quiet,
//! --verbose, --log-level, --log-json

pub mod args;
pub mod commands;
pub mod output;

use clap::Parser;
use std::path::PathBuf;

use llm_eval_core::config::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};

pub use commands::Commands;
pub use output::OutputFormat;

/// llm-eval - score, track and rank language-model evaluations
#[derive(Parser, Debug)]
#[command(name = "llm-eval")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = CONFIG_ENV_VAR, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Results directory (overrides paths.results)
    #[arg(long, global = true)]
    pub results: Option<PathBuf>,

    /// Prompt set file (overrides paths.prompts)
    #[arg(long, global = true)]
    pub prompts: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Debug logging and phase timing
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log level or filter directive (e.g. info, llm_eval_core::eval=trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
