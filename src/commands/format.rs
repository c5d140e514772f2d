//! Output helpers shared by the reporting commands

use serde::Serialize;

use llm_eval_core::error::Result;
use llm_eval_core::eval::{LayerCount, RunSummary};

/// Pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Three-decimal score, `-` when unavailable
pub fn score(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

fn layer_line(name: &str, count: &LayerCount) -> String {
    format!(
        "  {:<10} {:>4} populated  {:>4} unavailable",
        name, count.populated, count.unavailable
    )
}

/// Populated vs. unavailable counts per layer
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    vec![
        layer_line("response", &summary.response),
        layer_line("check", &summary.check),
        layer_line("judge", &summary.judge),
        layer_line("secondary", &summary.secondary),
        layer_line("composite", &summary.composite),
        format!("  {:<10} {:>4}", "flagged", summary.flagged),
        format!("  {:<10} {}", "mean", score(summary.mean_composite)),
    ]
}

pub fn print_summary(summary: &RunSummary) {
    for line in summary_lines(summary) {
        println!("{}", line);
    }
}

/// Pad or truncate to a fixed display width
pub fn cell(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
        out.push('~');
        out
    } else {
        format!("{:<width$}", text, width = width)
    }
}
