//! Capability boundaries for the external services a run depends on
//!
//! The evaluator only talks to models through these traits. Concrete HTTP
//! adapters live in [`crate::provider`]; tests plug in in-memory fakes.
//!
//! Capability errors never abort a run. They mark one layer of one record as
//! unavailable and their message is stored on the record.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::Usage;

/// Sampling parameters forwarded to a provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Provider-specific fields passed through verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Text produced by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Usage,
    /// Model name reported by the API, when it differs from the requested one
    pub api_model: Option<String>,
}

/// Everything the judge sees about one answer
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeRequest {
    pub prompt: String,
    pub ideal: String,
    pub criteria: Vec<String>,
    pub response: String,
    pub check_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    /// 1 to 5
    pub score: u8,
    pub rationale: String,
}

pub trait Provider: Send + Sync {
    /// Name used in logs and stored on responses
    fn name(&self) -> &str;

    fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<Completion, ProviderError>;
}

pub trait Judge: Send + Sync {
    fn name(&self) -> &str;

    fn judge(&self, request: &JudgeRequest) -> std::result::Result<JudgeVerdict, JudgeError>;
}

pub trait SecondaryScorer: Send + Sync {
    fn name(&self) -> &str;

    /// One value in `[0, 1]` per metric
    fn score(
        &self,
        prompt: &str,
        response: &str,
    ) -> std::result::Result<BTreeMap<String, f64>, ScorerError>;
}

/// Errors that can be retried and produced by the deadline wrapper
pub trait CapabilityError: std::error::Error + Send + 'static {
    fn is_retryable(&self) -> bool;

    /// The call did not finish before its deadline
    fn timed_out(after: Duration) -> Self;

    /// The call's worker thread died without a result
    fn aborted() -> Self;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request rejected {status}: {message}")]
    Request { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("provider misconfigured: {0}")]
    Config(String),

    #[error("call aborted")]
    Aborted,
}

impl ProviderError {
    /// Classify an HTTP status code
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ProviderError::Auth(message),
            429 => ProviderError::RateLimited(message),
            500..=599 => ProviderError::Server { status, message },
            _ => ProviderError::Request { status, message },
        }
    }
}

impl CapabilityError for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport(_)
                | ProviderError::Timeout(_)
                | ProviderError::RateLimited(_)
                | ProviderError::Server { .. }
        )
    }

    fn timed_out(after: Duration) -> Self {
        ProviderError::Timeout(after)
    }

    fn aborted() -> Self {
        ProviderError::Aborted
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JudgeError {
    #[error("judge provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed judge output: {0}")]
    Malformed(String),
}

impl CapabilityError for JudgeError {
    fn is_retryable(&self) -> bool {
        match self {
            JudgeError::Provider(e) => e.is_retryable(),
            JudgeError::Malformed(_) => true,
        }
    }

    fn timed_out(after: Duration) -> Self {
        JudgeError::Provider(ProviderError::Timeout(after))
    }

    fn aborted() -> Self {
        JudgeError::Provider(ProviderError::Aborted)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScorerError {
    #[error("scorer provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed scorer output: {0}")]
    Malformed(String),
}

impl CapabilityError for ScorerError {
    fn is_retryable(&self) -> bool {
        match self {
            ScorerError::Provider(e) => e.is_retryable(),
            ScorerError::Malformed(_) => true,
        }
    }

    fn timed_out(after: Duration) -> Self {
        ScorerError::Provider(ProviderError::Timeout(after))
    }

    fn aborted() -> Self {
        ScorerError::Provider(ProviderError::Aborted)
    }
}
