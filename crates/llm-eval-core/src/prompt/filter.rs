//! Prompt filtering by id, category, subcategory and difficulty

use serde::{Deserialize, Serialize};

use super::Prompt;

/// Restricts the prompt population; empty dimensions match everything
///
/// Ids match exactly. Category, subcategory and difficulty match
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcategories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub difficulties: Vec<String>,
}

impl PromptFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(mut self, ids: &[String]) -> Self {
        self.ids = ids.to_vec();
        self
    }

    pub fn with_categories(mut self, categories: &[String]) -> Self {
        self.categories = lowered(categories);
        self
    }

    pub fn with_subcategories(mut self, subcategories: &[String]) -> Self {
        self.subcategories = lowered(subcategories);
        self
    }

    pub fn with_difficulties(mut self, difficulties: &[String]) -> Self {
        self.difficulties = lowered(difficulties);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
            && self.categories.is_empty()
            && self.subcategories.is_empty()
            && self.difficulties.is_empty()
    }

    pub fn matches(&self, prompt: &Prompt) -> bool {
        if !self.ids.is_empty() && !self.ids.iter().any(|id| *id == prompt.id) {
            return false;
        }
        matches_dimension(&self.categories, &prompt.category)
            && matches_dimension(&self.subcategories, &prompt.subcategory)
            && matches_dimension(&self.difficulties, &prompt.difficulty)
    }
}

fn lowered(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn matches_dimension(wanted: &[String], value: &str) -> bool {
    if wanted.is_empty() {
        return true;
    }
    let value = value.to_lowercase();
    wanted.iter().any(|w| w.to_lowercase() == value)
}
