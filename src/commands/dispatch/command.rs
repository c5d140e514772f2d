//! Command trait and context for dispatching commands

use std::cell::OnceCell;
use std::time::Instant;

use tracing::debug;

use crate::cli::Cli;
use llm_eval_core::config::EvalConfig;
use llm_eval_core::error::Result;
use llm_eval_core::ledger::Ledger;
use llm_eval_core::prompt::PromptSet;

use super::macros::trace_command;

/// Shared context for command execution
///
/// The configuration is loaded on first use, so commands that never need it
/// do not fail on a missing file.
pub struct CommandContext<'a> {
    pub cli: &'a Cli,
    pub start: Instant,
    config: OnceCell<EvalConfig>,
}

impl<'a> CommandContext<'a> {
    pub fn new(cli: &'a Cli, start: Instant) -> Self {
        Self {
            cli,
            start,
            config: OnceCell::new(),
        }
    }

    pub fn config(&self) -> Result<&EvalConfig> {
        if let Some(config) = self.config.get() {
            return Ok(config);
        }
        let loaded = EvalConfig::load(&self.cli.config)?;
        trace_command!(self.cli, self.start, "load_config");
        Ok(self.config.get_or_init(|| loaded))
    }

    /// Ledger over `--results`, or the configured results directory
    pub fn ledger(&self) -> Result<Ledger> {
        let dir = match &self.cli.results {
            Some(dir) => dir.clone(),
            None => self.config()?.results_dir(),
        };
        debug!(results = %dir.display(), "ledger_dir");
        Ok(Ledger::new(dir))
    }

    /// Prompt set from `--prompts`, or the configured prompt file
    pub fn prompt_set(&self) -> Result<PromptSet> {
        let path = match &self.cli.prompts {
            Some(path) => path.clone(),
            None => self.config()?.prompts_path(),
        };
        let set = PromptSet::load(&path)?;
        trace_command!(self.cli, self.start, "load_prompts");
        Ok(set)
    }
}

/// Trait for commands that can be executed
pub trait Command {
    fn execute(&self, ctx: &CommandContext) -> Result<()>;
}

/// No-op command (when no subcommand is provided)
pub struct NoCommand;

impl Command for NoCommand {
    fn execute(&self, _ctx: &CommandContext) -> Result<()> {
        println!("llm-eval {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Multi-layer scoring and ranking for language-model evaluations.");
        println!();
        println!("Run `llm-eval --help` for usage information.");
        Ok(())
    }
}
