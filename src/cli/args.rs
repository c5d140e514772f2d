//! Argument groups shared by several commands

use clap::Args;

use llm_eval_core::prompt::PromptFilter;

/// Prompt population filters
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only these prompt ids (repeatable or comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Only these categories, case-insensitive
    #[arg(long, value_delimiter = ',')]
    pub category: Vec<String>,

    /// Only these subcategories, case-insensitive
    #[arg(long, value_delimiter = ',')]
    pub subcategory: Vec<String>,

    /// Only these difficulties, case-insensitive
    #[arg(long, value_delimiter = ',')]
    pub difficulty: Vec<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> PromptFilter {
        PromptFilter::new()
            .with_ids(&self.ids)
            .with_categories(&self.category)
            .with_subcategories(&self.subcategory)
            .with_difficulties(&self.difficulty)
    }
}
