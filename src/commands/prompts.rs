//! `llm-eval prompts` command - list the prompt set

use crate::cli::commands::report::PromptsArgs;
use crate::cli::OutputFormat;
use crate::commands::dispatch::command::CommandContext;
use crate::commands::format::{self, cell};
use llm_eval_core::error::Result;
use llm_eval_core::prompt::Prompt;

/// Execute the prompts command
pub fn execute(ctx: &CommandContext, args: &PromptsArgs) -> Result<()> {
    let prompts = ctx.prompt_set()?;
    let selected = prompts.filter(&args.filter.to_filter());

    match ctx.cli.format {
        OutputFormat::Json => format::print_json(&selected),
        OutputFormat::Human => {
            output_human(ctx, &selected, prompts.len());
            Ok(())
        }
    }
}

fn output_human(ctx: &CommandContext, prompts: &[&Prompt], total: usize) {
    if prompts.is_empty() {
        if !ctx.cli.quiet {
            println!("No prompts found");
        }
        return;
    }

    for prompt in prompts {
        println!(
            "{} {} {} {} {}",
            cell(&prompt.id, 10),
            cell(&prompt.category, 14),
            cell(&prompt.difficulty, 8),
            cell(prompt.check_type.as_str(), 18),
            first_line(&prompt.prompt, 60)
        );
    }
    if !ctx.cli.quiet {
        println!();
        println!("{} of {} prompts", prompts.len(), total);
    }
}

fn first_line(text: &str, width: usize) -> String {
    cell(text.lines().next().unwrap_or("").trim(), width)
        .trim_end()
        .to_string()
}
