//! Command implementations for all llm-eval commands

use crate::cli::Commands;
use crate::commands::dispatch::command::{Command, CommandContext};
use llm_eval_core::error::Result;
use llm_eval_core::eval::Layer;

impl Command for Commands {
    fn execute(&self, ctx: &CommandContext) -> Result<()> {
        dispatch_command::execute(self, ctx)
    }
}

pub(super) mod dispatch_command {
    use super::*;

    use crate::commands::{compare, eval, history, models, prompts, rescore};

    pub(super) fn execute(cmd: &Commands, ctx: &CommandContext) -> Result<()> {
        match cmd {
            Commands::Eval(args) => eval::execute(ctx, args),
            Commands::Compare(args) => compare::execute(ctx, args),
            Commands::Rejudge(args) => rescore::execute(ctx, args, Layer::Judge),
            Commands::Deepeval(args) => rescore::execute(ctx, args, Layer::Secondary),
            Commands::Models => models::execute(ctx),
            Commands::Prompts(args) => prompts::execute(ctx, args),
            Commands::History(args) => history::execute(ctx, args),
        }
    }
}
