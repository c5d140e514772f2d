//! Heuristic checker dispatch
//!
//! Each [`CheckType`] maps to exactly one pure function. Checkers only look at
//! the prompt's parameters and the response text, so re-running a checker on
//! stored data always reproduces the stored [`CheckResult`] byte for byte.
//!
//! The judgement-heavy types (`reasoning`, `calibration`, `format_check`,
//! `checklist`, `none`) are no-ops: they pass with no flags and leave scoring
//! entirely to the judge layer.

mod heuristics;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EvalError, Result};
use crate::prompt::Prompt;

/// Flag raised by every content checker for a blank response
pub const EMPTY_RESPONSE: &str = "EMPTY_RESPONSE";

/// Outcome of running a heuristic checker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(default)]
    pub flags: BTreeSet<String>,
    #[serde(default)]
    pub auto_scores: BTreeMap<String, f64>,
    pub passed: bool,
}

impl CheckResult {
    /// Passing result with no flags and no scores
    pub fn pass() -> Self {
        Self {
            flags: BTreeSet::new(),
            auto_scores: BTreeMap::new(),
            passed: true,
        }
    }

    /// Build a result whose `passed` is derived from the flag set
    pub(crate) fn from_parts(flags: BTreeSet<String>, auto_scores: BTreeMap<String, f64>) -> Self {
        let passed = flags.is_empty();
        Self {
            flags,
            auto_scores,
            passed,
        }
    }

    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Flags as a sorted list, for judge context and display
    pub fn flag_list(&self) -> Vec<String> {
        self.flags.iter().cloned().collect()
    }
}

type Checker = fn(&Prompt, &str) -> Result<CheckResult>;

/// Closed set of heuristic checkers, selected by a prompt's `check_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckType {
    Reasoning,
    Calibration,
    FormatCheck,
    Checklist,
    None,
    WordCount,
    Constraints,
    Refusal,
    Hallucination,
    Code,
}

impl CheckType {
    pub const ALL: [CheckType; 10] = [
        CheckType::Reasoning,
        CheckType::Calibration,
        CheckType::FormatCheck,
        CheckType::Checklist,
        CheckType::None,
        CheckType::WordCount,
        CheckType::Constraints,
        CheckType::Refusal,
        CheckType::Hallucination,
        CheckType::Code,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Reasoning => "reasoning",
            CheckType::Calibration => "calibration",
            CheckType::FormatCheck => "format_check",
            CheckType::Checklist => "checklist",
            CheckType::None => "none",
            CheckType::WordCount => "word_count",
            CheckType::Constraints => "constraints",
            CheckType::Refusal => "refusal",
            CheckType::Hallucination => "hallucination",
            CheckType::Code => "code",
        }
    }

    /// Types whose scoring is deferred entirely to the judge
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            CheckType::Reasoning
                | CheckType::Calibration
                | CheckType::FormatCheck
                | CheckType::Checklist
                | CheckType::None
        )
    }

    fn checker(&self) -> Checker {
        match self {
            CheckType::Reasoning
            | CheckType::Calibration
            | CheckType::FormatCheck
            | CheckType::Checklist
            | CheckType::None => noop,
            CheckType::WordCount => heuristics::word_count,
            CheckType::Constraints => heuristics::constraints,
            CheckType::Refusal => heuristics::refusal,
            CheckType::Hallucination => heuristics::hallucination,
            CheckType::Code => heuristics::code,
        }
    }

    /// Validate that a prompt carries the parameters this checker needs
    pub fn validate(&self, prompt: &Prompt) -> Result<()> {
        let params = &prompt.params;
        match self {
            CheckType::WordCount => {
                let target = params.target_words.ok_or_else(|| {
                    EvalError::missing_param(&prompt.id, self.as_str(), "target_words")
                })?;
                if target == 0 {
                    return Err(EvalError::invalid_param(
                        &prompt.id,
                        "target_words",
                        "must be greater than zero",
                    ));
                }
                if let Some(tolerance) = params.word_tolerance {
                    if !tolerance.is_finite() || tolerance < 0.0 {
                        return Err(EvalError::invalid_param(
                            &prompt.id,
                            "word_tolerance",
                            format!("must be a non-negative number, got {}", tolerance),
                        ));
                    }
                }
            }
            CheckType::Constraints => {
                if params.constraints.is_empty() {
                    return Err(EvalError::missing_param(
                        &prompt.id,
                        self.as_str(),
                        "constraints",
                    ));
                }
                for constraint in &params.constraints {
                    if let crate::prompt::Constraint::Regex(pattern) = constraint {
                        regex::Regex::new(pattern).map_err(|e| {
                            EvalError::invalid_param(&prompt.id, "constraints", e)
                        })?;
                    }
                }
            }
            CheckType::Hallucination => {
                if params.trap.is_none() {
                    return Err(EvalError::missing_param(&prompt.id, self.as_str(), "trap"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = EvalError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CheckType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EvalError::invalid_value("check_type", s))
    }
}

impl Serialize for CheckType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CheckType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn noop(_prompt: &Prompt, _response: &str) -> Result<CheckResult> {
    Ok(CheckResult::pass())
}

/// Run the heuristic checker selected by the prompt's `check_type`
pub fn check(prompt: &Prompt, response: &str) -> Result<CheckResult> {
    let check_type = prompt.check_type;
    if !check_type.is_noop() && response.trim().is_empty() {
        let mut flags = BTreeSet::new();
        flags.insert(EMPTY_RESPONSE.to_string());
        return Ok(CheckResult::from_parts(flags, BTreeMap::new()));
    }
    (check_type.checker())(prompt, response)
}
