//! Compare report rendering: terminal tables and the `--save` markdown file

use super::CompareReport;
use crate::commands::format::score;
use llm_eval_core::compare::{PromptDetail, PromptScore, RankEntry};

/// Header row plus body rows, rendered either as aligned text or markdown
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|c| c.chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn to_text(&self) -> String {
        let widths = self.widths();
        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<w$}", c, w = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };
        let mut out = line(&self.headers);
        for row in &self.rows {
            out.push('\n');
            out.push_str(&line(row));
        }
        out
    }

    fn to_markdown(&self) -> String {
        let line = |cells: &[String]| format!("| {} |", cells.join(" | "));
        let mut out = line(&self.headers);
        out.push('\n');
        out.push_str(&line(&vec!["---".to_string(); self.headers.len()]));
        for row in &self.rows {
            out.push('\n');
            out.push_str(&line(row));
        }
        out
    }
}

fn optional(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

fn leaderboard(report: &CompareReport) -> Table {
    let mut table = Table::new(&[
        "#",
        "Model",
        "Composite",
        "Judge",
        "Secondary",
        "Scored",
        "Flagged",
        "Latency (s)",
        "Out tokens",
    ]);
    for (i, entry) in report.ranking.iter().enumerate() {
        table.push(vec![
            (i + 1).to_string(),
            entry.model_id.clone(),
            score(entry.mean_composite),
            score(entry.mean_judge),
            score(entry.mean_secondary),
            format!("{}/{}", entry.scored, report.population),
            entry.flagged.to_string(),
            optional(entry.avg_latency_s, 2),
            optional(entry.avg_output_tokens, 0),
        ]);
    }
    table
}

fn category_cell(entry: &RankEntry, category: &str) -> String {
    match entry.per_category.get(category) {
        Some(stats) => format!(
            "{} ({}/{})",
            score(stats.mean_composite),
            stats.scored,
            stats.total
        ),
        None => "-".to_string(),
    }
}

fn by_category(report: &CompareReport) -> Table {
    let mut headers = vec!["Model"];
    headers.extend(report.categories.iter().map(String::as_str));
    let mut table = Table::new(&headers);
    for entry in &report.ranking {
        let mut row = vec![entry.model_id.clone()];
        row.extend(report.categories.iter().map(|c| category_cell(entry, c)));
        table.push(row);
    }
    table
}

fn flag_lines(report: &CompareReport) -> Vec<String> {
    report
        .flagged
        .iter()
        .map(|prompt| {
            let models: Vec<String> = prompt
                .models
                .iter()
                .map(|m| format!("{} [{}]", m.model_id, m.flags.join(", ")))
                .collect();
            format!("{} ({}): {}", prompt.prompt_id, prompt.category, models.join("; "))
        })
        .collect()
}

fn trend_tables(report: &CompareReport) -> Vec<(String, Table)> {
    let Some(trends) = &report.trends else {
        return Vec::new();
    };
    trends
        .iter()
        .map(|(model_id, points)| {
            let mut table = Table::new(&["Run", "Started", "Composite", "Scored"]);
            for point in points {
                table.push(vec![
                    point.run_id.to_string(),
                    point.started_at.format("%Y-%m-%d %H:%M").to_string(),
                    score(point.mean_composite),
                    format!("{}/{}", point.scored, point.matched),
                ]);
            }
            (model_id.clone(), table)
        })
        .collect()
}

/// Print the report as terminal tables
pub fn output_human(report: &CompareReport) {
    println!("Leaderboard ({} prompts)", report.population);
    println!("{}", leaderboard(report).to_text());

    if !report.categories.is_empty() {
        println!();
        println!("By category");
        println!("{}", by_category(report).to_text());
    }

    let flags = flag_lines(report);
    if !flags.is_empty() {
        println!();
        println!("Notable flags");
        for line in flags {
            println!("  {}", line);
        }
    }

    for (model_id, table) in trend_tables(report) {
        println!();
        println!("History: {}", model_id);
        println!("{}", table.to_text());
    }
}

fn detail_heading(detail: &PromptDetail) -> String {
    let context: Vec<&str> = [&detail.category, &detail.subcategory, &detail.difficulty]
        .into_iter()
        .map(String::as_str)
        .filter(|part| !part.is_empty())
        .collect();
    if context.is_empty() {
        format!("### {}", detail.prompt_id)
    } else {
        format!("### {} ({})", detail.prompt_id, context.join(" / "))
    }
}

fn detail_line(entry: &PromptScore) -> String {
    let judge = entry
        .judge_score
        .map_or_else(|| "-".to_string(), |s| format!("{}/5", s));
    let mut line = format!(
        "- **{}**: judge {}, composite {}",
        entry.model_id,
        judge,
        score(entry.composite_score)
    );
    if !entry.flags.is_empty() {
        line.push_str(&format!(" [{}]", entry.flags.join(", ")));
    }
    if let Some(rationale) = &entry.rationale {
        // Rationales are free text; keep each entry on one list line
        let flattened: Vec<&str> = rationale.split_whitespace().collect();
        line.push_str(&format!(" - {}", flattened.join(" ")));
    }
    line
}

/// Render the report as a markdown document
pub fn render_markdown(report: &CompareReport) -> String {
    let mut sections = vec![
        "# Model comparison".to_string(),
        format!(
            "Generated {} over {} prompts.",
            report.generated_at.format("%Y-%m-%d %H:%M UTC"),
            report.population
        ),
        format!("## Leaderboard\n\n{}", leaderboard(report).to_markdown()),
    ];

    if !report.categories.is_empty() {
        sections.push(format!(
            "## By category\n\n{}",
            by_category(report).to_markdown()
        ));
    }

    let flags = flag_lines(report);
    if !flags.is_empty() {
        let items: Vec<String> = flags.iter().map(|line| format!("- {}", line)).collect();
        sections.push(format!("## Notable flags\n\n{}", items.join("\n")));
    }

    let trends = trend_tables(report);
    if !trends.is_empty() {
        sections.push("## History".to_string());
        for (model_id, table) in trends {
            sections.push(format!("### {}\n\n{}", model_id, table.to_markdown()));
        }
    }

    if !report.details.is_empty() {
        sections.push("## Per-prompt detail".to_string());
        for detail in &report.details {
            let lines: Vec<String> = detail.scores.iter().map(detail_line).collect();
            sections.push(format!("{}\n\n{}", detail_heading(detail), lines.join("\n")));
        }
    }

    let mut out = sections.join("\n\n");
    out.push('\n');
    out
}
