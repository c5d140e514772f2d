//! llm-eval Core Library
//!
//! Multi-layer scoring engine for language-model evaluations: heuristic
//! checks, an LLM judge and a secondary scorer combined into one composite
//! value, an append-only per-model run ledger, and cross-model ranking.

pub mod capability;
pub mod check;
pub mod compare;
pub mod config;
pub mod error;
pub mod eval;
pub mod ledger;
pub mod logging;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod score;
