//! Command dispatch logic for llm-eval

use std::time::Instant;

use crate::cli::Cli;
use llm_eval_core::error::Result;

pub mod command;
mod commands;
pub(crate) mod macros;

use command::{Command, CommandContext, NoCommand};

pub fn run(cli: &Cli, start: Instant) -> Result<()> {
    let ctx = CommandContext::new(cli, start);

    match &cli.command {
        None => NoCommand.execute(&ctx),
        Some(cmd) => cmd.execute(&ctx),
    }
}
