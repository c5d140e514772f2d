//! Prompt set loading, validation and filtering
//!
//! A prompt set is a JSON (`{"prompts": [...]}`) or YAML file. Loading
//! validates every prompt up front: ids must be unique, `check_type` must name
//! a known checker, and checker parameters must be present and well-formed.
//! Nothing downstream ever sees an unvalidated prompt.

mod filter;
mod types;

pub use filter::PromptFilter;
pub use types::{CheckParams, Constraint, Criteria, Prompt};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::check::CheckType;
use crate::error::{EvalError, Result};
use types::RawPrompt;

#[derive(Deserialize)]
#[serde(untagged)]
enum PromptFile {
    Wrapped { prompts: Vec<RawPrompt> },
    Bare(Vec<RawPrompt>),
}

impl PromptFile {
    fn into_prompts(self) -> Vec<RawPrompt> {
        match self {
            PromptFile::Wrapped { prompts } | PromptFile::Bare(prompts) => prompts,
        }
    }
}

/// A validated, immutable set of prompts
#[derive(Debug, Clone)]
pub struct PromptSet {
    path: Option<PathBuf>,
    prompts: Vec<Prompt>,
}

impl PromptSet {
    /// Load and validate a prompt set from disk
    ///
    /// Files ending in `.yaml`/`.yml` are parsed as YAML, everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| EvalError::InvalidPromptSet {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        let file: PromptFile = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| EvalError::InvalidPromptSet {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| EvalError::InvalidPromptSet {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        let mut set = Self::from_raw(file.into_prompts())?;
        set.path = Some(path.to_path_buf());
        debug!(path = %path.display(), prompts = set.len(), "prompt_set_loaded");
        Ok(set)
    }

    /// Parse a prompt set from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: PromptFile = serde_json::from_str(content)?;
        Self::from_raw(file.into_prompts())
    }

    fn from_raw(raw: Vec<RawPrompt>) -> Result<Self> {
        let prompts = raw
            .into_iter()
            .map(RawPrompt::into_prompt)
            .collect::<Result<Vec<_>>>()?;
        Self::from_prompts(prompts)
    }

    /// Build a prompt set from already-typed prompts, validating ids and params
    pub fn from_prompts(prompts: Vec<Prompt>) -> Result<Self> {
        let mut seen = HashSet::new();
        for prompt in &prompts {
            if prompt.id.trim().is_empty() {
                return Err(EvalError::invalid_value("prompt id", "(empty)"));
            }
            if !seen.insert(prompt.id.as_str()) {
                return Err(EvalError::DuplicatePrompt {
                    id: prompt.id.clone(),
                });
            }
            prompt.check_type.validate(prompt)?;
        }

        Ok(Self {
            path: None,
            prompts,
        })
    }

    /// Path the set was loaded from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Look up a prompt by id
    pub fn get(&self, id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    /// Prompts matching the filter, in file order
    pub fn filter(&self, filter: &PromptFilter) -> Vec<&Prompt> {
        self.prompts.iter().filter(|p| filter.matches(p)).collect()
    }

    /// Distinct categories in file order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.prompts
            .iter()
            .map(|p| p.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// SHA-256 over the canonical JSON of every prompt
    ///
    /// Recorded on each run so later comparisons can tell whether two runs
    /// were scored against the same prompt text and checker parameters.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for prompt in &self.prompts {
            // Serializing plain data with derived impls cannot fail
            let json = serde_json::to_string(prompt).unwrap_or_default();
            hasher.update(json.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Supported check type names, for error messages
pub(crate) fn supported_check_types() -> String {
    CheckType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests;
