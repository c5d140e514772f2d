//! CLI commands for llm-eval

pub mod compare;
pub mod dispatch;
pub mod eval;
pub mod format;
pub mod history;
pub mod models;
pub mod prompts;
pub mod rescore;
