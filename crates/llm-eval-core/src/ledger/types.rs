//! Persisted ledger types
//!
//! Every struct carries an `extras` map so fields written by newer versions
//! survive a read-modify-write cycle by an older binary.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::check::CheckResult;
use crate::score::{self, Weights};

/// Current on-disk format version
pub const LEDGER_VERSION: u32 = 1;

/// Unknown fields preserved across rewrites
pub type Extras = BTreeMap<String, serde_json::Value>;

/// Unique identifier of a run within a model's history
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Fresh, time-ordered run id
    pub fn generate() -> Self {
        RunId(format!("run-{}", Ulid::new().to_string().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        RunId(s)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token and cost accounting reported by a provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

/// A model's answer to one prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    pub latency_s: f64,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub api_model: String,
    #[serde(flatten)]
    pub extras: Extras,
}

/// Judge layer result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeScore {
    pub score: u8,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub judge_model: String,
    pub scored_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extras: Extras,
}

impl JudgeScore {
    pub fn new(score: u8, rationale: impl Into<String>, judge_model: impl Into<String>) -> Self {
        Self {
            score,
            rationale: rationale.into(),
            judge_model: judge_model.into(),
            scored_at: Utc::now(),
            extras: Extras::new(),
        }
    }
}

/// Secondary scorer layer result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryScore {
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub scorer: String,
    pub scored_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extras: Extras,
}

impl SecondaryScore {
    pub fn new(metrics: BTreeMap<String, f64>, scorer: impl Into<String>) -> Self {
        Self {
            metrics,
            scorer: scorer.into(),
            scored_at: Utc::now(),
            extras: Extras::new(),
        }
    }
}

/// Why a layer is unavailable on a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerErrors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

impl LayerErrors {
    pub fn is_empty(&self) -> bool {
        self.response.is_none() && self.judge.is_none() && self.secondary.is_none()
    }
}

/// One prompt's outcome within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub prompt_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_result: Option<CheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<SecondaryScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_score: Option<f64>,
    #[serde(default, skip_serializing_if = "LayerErrors::is_empty")]
    pub errors: LayerErrors,
    #[serde(flatten)]
    pub extras: Extras,
}

impl RunRecord {
    /// Record with no layers populated yet
    pub fn new(prompt_id: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            timestamp: Utc::now(),
            response: None,
            check_result: None,
            judge: None,
            secondary: None,
            composite_score: None,
            errors: LayerErrors::default(),
            extras: Extras::new(),
        }
    }

    pub fn normalized_judge(&self) -> Option<f64> {
        self.judge.as_ref().map(|j| score::normalize_judge(j.score))
    }

    pub fn normalized_secondary(&self) -> Option<f64> {
        self.secondary
            .as_ref()
            .and_then(|s| score::normalize_secondary(&s.metrics))
    }

    /// Recompute the composite from the judge and secondary layers
    pub fn refresh_composite(&mut self, weights: &Weights) {
        self.composite_score =
            score::composite(self.normalized_judge(), self.normalized_secondary(), weights);
    }

    /// True when the heuristic check raised at least one flag
    pub fn is_flagged(&self) -> bool {
        self.check_result
            .as_ref()
            .map(CheckResult::is_flagged)
            .unwrap_or(false)
    }
}

/// One complete pass over a prompt set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scorer_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_set_fingerprint: Option<String>,
    #[serde(default)]
    pub records: Vec<RunRecord>,
    #[serde(flatten)]
    pub extras: Extras,
}

impl Run {
    /// Empty run stamped with a fresh id and the current time
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::generate(),
            started_at: now,
            completed_at: now,
            api_model: None,
            judge_model: None,
            scorer_model: None,
            prompt_set_fingerprint: None,
            records: Vec::new(),
            extras: Extras::new(),
        }
    }

    pub fn record(&self, prompt_id: &str) -> Option<&RunRecord> {
        self.records.iter().find(|r| r.prompt_id == prompt_id)
    }

    pub fn record_mut(&mut self, prompt_id: &str) -> Option<&mut RunRecord> {
        self.records.iter_mut().find(|r| r.prompt_id == prompt_id)
    }

    /// First prompt id that appears more than once, if any
    pub fn duplicate_prompt_id(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .map(|r| r.prompt_id.as_str())
            .find(|id| !seen.insert(*id))
    }
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}

/// Full evaluation history of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    #[serde(default = "default_version")]
    pub version: u32,
    pub model_id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(flatten)]
    pub extras: Extras,
}

fn default_version() -> u32 {
    LEDGER_VERSION
}

impl ModelResult {
    /// Empty history for a model that has never been evaluated
    pub fn new(model_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: LEDGER_VERSION,
            model_id: model_id.into(),
            created: now,
            updated: now,
            runs: Vec::new(),
            extras: Extras::new(),
        }
    }

    /// Run with the greatest insertion index
    pub fn latest_run(&self) -> Option<&Run> {
        self.runs.last()
    }

    pub fn run(&self, run_id: &RunId) -> Option<&Run> {
        self.runs.iter().find(|r| r.run_id == *run_id)
    }

    pub fn run_mut(&mut self, run_id: &RunId) -> Option<&mut Run> {
        self.runs.iter_mut().find(|r| r.run_id == *run_id)
    }
}

/// Targeted update of one score layer of one record
///
/// `Err` carries the failure message of a rescoring attempt. The previous
/// layer value is kept and the error is recorded next to it.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPatch {
    Judge(std::result::Result<JudgeScore, String>),
    Secondary(std::result::Result<SecondaryScore, String>),
}

impl RecordPatch {
    /// Apply the patch and refresh the composite score
    pub fn apply(self, record: &mut RunRecord, weights: &Weights) {
        match self {
            RecordPatch::Judge(Ok(score)) => {
                record.judge = Some(score);
                record.errors.judge = None;
            }
            RecordPatch::Judge(Err(message)) => record.errors.judge = Some(message),
            RecordPatch::Secondary(Ok(score)) => {
                record.secondary = Some(score);
                record.errors.secondary = None;
            }
            RecordPatch::Secondary(Err(message)) => record.errors.secondary = Some(message),
        }
        record.refresh_composite(weights);
    }
}
