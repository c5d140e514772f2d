//! Cross-model ranking over the latest run of each model
//!
//! The population is the set of prompts in the current prompt set that match
//! the filter. Records for prompts outside it are ignored, so a model that was
//! evaluated on an older or larger prompt set is still compared fairly.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ledger::{ModelResult, Run, RunId, RunRecord};
use crate::prompt::{PromptFilter, PromptSet};

/// Aggregates for one category within a ranking entry
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryStats {
    pub mean_composite: Option<f64>,
    pub scored: usize,
    pub total: usize,
}

/// One row of the ranked comparison table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub model_id: String,
    pub run_id: Option<RunId>,
    pub mean_composite: Option<f64>,
    pub mean_judge: Option<f64>,
    pub mean_secondary: Option<f64>,
    /// Records whose prompt is in the population
    pub matched: usize,
    /// Matched records with a composite score
    pub scored: usize,
    /// Matched records with at least one check flag
    pub flagged: usize,
    pub avg_latency_s: Option<f64>,
    pub avg_output_tokens: Option<f64>,
    pub per_category: BTreeMap<String, CategoryStats>,
}

/// Summary of one run, for longitudinal comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub mean_composite: Option<f64>,
    pub matched: usize,
    pub scored: usize,
}

/// Models whose latest record for a prompt carries check flags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedPrompt {
    pub prompt_id: String,
    pub category: String,
    pub models: Vec<FlaggedModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedModel {
    pub model_id: String,
    pub flags: Vec<String>,
}

/// One model's latest record for a prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptScore {
    pub model_id: String,
    pub judge_score: Option<u8>,
    pub composite_score: Option<f64>,
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Every model's latest record for one prompt of the population
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptDetail {
    pub prompt_id: String,
    pub category: String,
    pub subcategory: String,
    pub difficulty: String,
    pub scores: Vec<PromptScore>,
}

/// Prompt id to category for every prompt in the population
struct Population<'a> {
    categories: HashMap<&'a str, &'a str>,
}

impl<'a> Population<'a> {
    fn new(prompts: &'a PromptSet, filter: &PromptFilter) -> Self {
        let categories = prompts
            .filter(filter)
            .into_iter()
            .map(|p| (p.id.as_str(), p.category.as_str()))
            .collect();
        Self { categories }
    }

    fn category_of(&self, prompt_id: &str) -> Option<&'a str> {
        self.categories.get(prompt_id).copied()
    }

    fn records<'r>(&self, run: &'r Run) -> Vec<(&'a str, &'r RunRecord)> {
        run.records
            .iter()
            .filter_map(|r| self.category_of(&r.prompt_id).map(|c| (c, r)))
            .collect()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn summarize(model_id: &str, run: Option<&Run>, population: &Population<'_>) -> RankEntry {
    let mut entry = RankEntry {
        model_id: model_id.to_string(),
        run_id: run.map(|r| r.run_id.clone()),
        mean_composite: None,
        mean_judge: None,
        mean_secondary: None,
        matched: 0,
        scored: 0,
        flagged: 0,
        avg_latency_s: None,
        avg_output_tokens: None,
        per_category: BTreeMap::new(),
    };
    let Some(run) = run else {
        return entry;
    };

    let matched = population.records(run);
    entry.matched = matched.len();
    entry.scored = matched
        .iter()
        .filter(|(_, r)| r.composite_score.is_some())
        .count();
    entry.flagged = matched.iter().filter(|(_, r)| r.is_flagged()).count();
    entry.mean_composite = mean(matched.iter().filter_map(|(_, r)| r.composite_score));
    entry.mean_judge = mean(matched.iter().filter_map(|(_, r)| r.normalized_judge()));
    entry.mean_secondary = mean(matched.iter().filter_map(|(_, r)| r.normalized_secondary()));
    entry.avg_latency_s = mean(
        matched
            .iter()
            .filter_map(|(_, r)| r.response.as_ref().map(|resp| resp.latency_s)),
    );
    entry.avg_output_tokens = mean(matched.iter().filter_map(|(_, r)| {
        r.response
            .as_ref()
            .and_then(|resp| resp.usage.output_tokens)
            .map(|t| t as f64)
    }));

    let mut by_category: BTreeMap<String, Vec<&RunRecord>> = BTreeMap::new();
    for (category, record) in &matched {
        by_category
            .entry(category.to_string())
            .or_default()
            .push(*record);
    }
    entry.per_category = by_category
        .into_iter()
        .map(|(category, records)| {
            let stats = CategoryStats {
                mean_composite: mean(records.iter().filter_map(|r| r.composite_score)),
                scored: records.iter().filter(|r| r.composite_score.is_some()).count(),
                total: records.len(),
            };
            (category, stats)
        })
        .collect();

    entry
}

/// Descending with `None` last
fn cmp_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn rank_order(a: &RankEntry, b: &RankEntry) -> Ordering {
    cmp_desc(a.mean_composite, b.mean_composite)
        .then_with(|| cmp_desc(a.mean_judge, b.mean_judge))
        .then_with(|| a.model_id.cmp(&b.model_id))
}

/// Rank models by mean composite over the latest run
///
/// Every model passed in appears in the output; models with nothing to score
/// sort last with `mean_composite = None`.
pub fn rank(models: &[ModelResult], prompts: &PromptSet, filter: &PromptFilter) -> Vec<RankEntry> {
    let population = Population::new(prompts, filter);
    let mut entries: Vec<RankEntry> = models
        .iter()
        .map(|m| summarize(&m.model_id, m.latest_run(), &population))
        .collect();
    entries.sort_by(rank_order);
    entries
}

/// One summary per run of a model, oldest first
pub fn trend(model: &ModelResult, prompts: &PromptSet, filter: &PromptFilter) -> Vec<TrendPoint> {
    let population = Population::new(prompts, filter);
    model
        .runs
        .iter()
        .map(|run| {
            let entry = summarize(&model.model_id, Some(run), &population);
            TrendPoint {
                run_id: run.run_id.clone(),
                started_at: run.started_at,
                mean_composite: entry.mean_composite,
                matched: entry.matched,
                scored: entry.scored,
            }
        })
        .collect()
}

/// Prompts where at least one model's latest record carries check flags
pub fn flagged_prompts(
    models: &[ModelResult],
    prompts: &PromptSet,
    filter: &PromptFilter,
) -> Vec<FlaggedPrompt> {
    prompts
        .filter(filter)
        .into_iter()
        .filter_map(|prompt| {
            let flagged: Vec<FlaggedModel> = models
                .iter()
                .filter_map(|m| {
                    let record = m.latest_run()?.record(&prompt.id)?;
                    let result = record.check_result.as_ref()?;
                    result.is_flagged().then(|| FlaggedModel {
                        model_id: m.model_id.clone(),
                        flags: result.flag_list(),
                    })
                })
                .collect();
            (!flagged.is_empty()).then(|| FlaggedPrompt {
                prompt_id: prompt.id.clone(),
                category: prompt.category.clone(),
                models: flagged,
            })
        })
        .collect()
}

fn prompt_score(model: &ModelResult, record: &RunRecord) -> PromptScore {
    PromptScore {
        model_id: model.model_id.clone(),
        judge_score: record.judge.as_ref().map(|j| j.score),
        composite_score: record.composite_score,
        flags: record
            .check_result
            .as_ref()
            .map(|c| c.flag_list())
            .unwrap_or_default(),
        rationale: record
            .judge
            .as_ref()
            .map(|j| j.rationale.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    }
}

/// Per-prompt view of each model's latest run, in population order
///
/// Scores follow the order of `models`. Prompts no model answered are
/// left out.
pub fn prompt_details(
    models: &[&ModelResult],
    prompts: &PromptSet,
    filter: &PromptFilter,
) -> Vec<PromptDetail> {
    prompts
        .filter(filter)
        .into_iter()
        .filter_map(|prompt| {
            let scores: Vec<PromptScore> = models
                .iter()
                .filter_map(|m| {
                    let record = m.latest_run()?.record(&prompt.id)?;
                    Some(prompt_score(m, record))
                })
                .collect();
            (!scores.is_empty()).then(|| PromptDetail {
                prompt_id: prompt.id.clone(),
                category: prompt.category.clone(),
                subcategory: prompt.subcategory.clone(),
                difficulty: prompt.difficulty.clone(),
                scores,
            })
        })
        .collect()
}
