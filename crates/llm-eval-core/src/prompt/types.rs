//! Prompt type definitions

use serde::{Deserialize, Serialize};

use crate::check::CheckType;
use crate::error::{EvalError, Result};

/// Free-text scoring criteria, either one string or a list of bullet points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Criteria {
    List(Vec<String>),
    Text(String),
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::Text(String::new())
    }
}

impl Criteria {
    /// Criteria as individual lines
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Criteria::List(items) => items.iter().map(|s| s.as_str()).collect(),
            Criteria::Text(text) if text.trim().is_empty() => Vec::new(),
            Criteria::Text(text) => vec![text.as_str()],
        }
    }
}

/// A single structural constraint checked by the `constraints` checker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Constraint {
    /// Response must contain the text (case-insensitive)
    MustInclude(String),
    /// Response must not contain the text (case-insensitive)
    MustNotInclude(String),
    MinWords(usize),
    MaxWords(usize),
    MaxChars(usize),
    /// Trimmed response must start with the text (case-insensitive)
    StartsWith(String),
    /// Trimmed response must end with the text (case-insensitive)
    EndsWith(String),
    /// Exact number of bullet lines (`-`, `*`, `•` or `1.` style)
    BulletCount(usize),
    /// Response must match the regular expression
    Regex(String),
}

impl Constraint {
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::MustInclude(_) => "must_include",
            Constraint::MustNotInclude(_) => "must_not_include",
            Constraint::MinWords(_) => "min_words",
            Constraint::MaxWords(_) => "max_words",
            Constraint::MaxChars(_) => "max_chars",
            Constraint::StartsWith(_) => "starts_with",
            Constraint::EndsWith(_) => "ends_with",
            Constraint::BulletCount(_) => "bullet_count",
            Constraint::Regex(_) => "regex",
        }
    }
}

/// Optional checker-specific parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckParams {
    /// Target length for `word_count`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_words: Option<usize>,

    /// Allowed relative deviation from `target_words` (default 0.2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_tolerance: Option<f64>,

    /// Constraint list for `constraints`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,

    /// The prompt rests on a false premise (`hallucination`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trap: Option<bool>,

    /// Whether the model is expected to refuse (`refusal`, default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_refusal: Option<bool>,

    /// Expected code fence language for `code`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One evaluation prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub id: String,
    pub category: String,
    pub subcategory: String,
    pub difficulty: String,
    pub prompt: String,
    pub ideal: String,
    pub criteria: Criteria,
    pub check_type: CheckType,
    #[serde(flatten)]
    pub params: CheckParams,
}

impl Prompt {
    /// Minimal prompt used by tests and programmatic callers
    pub fn new(id: impl Into<String>, category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            subcategory: String::new(),
            difficulty: String::new(),
            prompt: text.into(),
            ideal: String::new(),
            criteria: Criteria::default(),
            check_type: CheckType::None,
            params: CheckParams::default(),
        }
    }

    pub fn with_check(mut self, check_type: CheckType, params: CheckParams) -> Self {
        self.check_type = check_type;
        self.params = params;
        self
    }

    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = difficulty.into();
        self
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = subcategory.into();
        self
    }
}

/// Prompt as written on disk, before the check type is resolved
#[derive(Debug, Deserialize)]
pub(crate) struct RawPrompt {
    id: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    subcategory: String,
    #[serde(default)]
    difficulty: String,
    prompt: String,
    #[serde(default)]
    ideal: String,
    #[serde(default)]
    criteria: Criteria,
    #[serde(default = "default_check_type")]
    check_type: String,
    #[serde(flatten)]
    params: CheckParams,
}

fn default_check_type() -> String {
    CheckType::None.as_str().to_string()
}

impl RawPrompt {
    pub(crate) fn into_prompt(self) -> Result<Prompt> {
        let check_type = self.check_type.parse::<CheckType>().map_err(|_| {
            EvalError::UnknownCheckType {
                prompt_id: self.id.clone(),
                check_type: self.check_type.clone(),
                supported: super::supported_check_types(),
            }
        })?;

        Ok(Prompt {
            id: self.id,
            category: self.category,
            subcategory: self.subcategory,
            difficulty: self.difficulty,
            prompt: self.prompt,
            ideal: self.ideal,
            criteria: self.criteria,
            check_type,
            params: self.params,
        })
    }
}
