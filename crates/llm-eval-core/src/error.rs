//! Error types and exit codes for llm-eval
//!
//! Exit codes:
//! - 0: Success
//! - 1: Generic failure (ledger writes, IO, interrupted runs)
//! - 2: Usage or configuration error (bad flags, invalid weights, unknown provider)
//! - 3: Data error (invalid prompt set, unknown model/run/record)
//!
//! Per-record capability failures (`ProviderError`, `JudgeError`,
//! `ScorerError`) live in [`crate::capability`]. They never abort a run and
//! never surface through [`EvalError`].

mod macros;

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the llm-eval binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage or configuration error (2)
    Usage = 2,
    /// Data error - invalid prompt set, missing model or run (3)
    Data = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Errors that can occur during llm-eval operations
#[derive(Error, Debug)]
pub enum EvalError {
    // Usage and configuration errors (exit code 2)
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("{0}")]
    UsageError(String),

    #[error("invalid {context}: {value}")]
    InvalidValue { context: String, value: String },

    // Data errors (exit code 3)
    #[error("prompt {prompt_id}: unknown check_type '{check_type}' (supported: {supported})")]
    UnknownCheckType {
        prompt_id: String,
        check_type: String,
        supported: String,
    },

    #[error("prompt {prompt_id}: check_type '{check_type}' requires '{param}'")]
    MissingCheckParam {
        prompt_id: String,
        check_type: String,
        param: String,
    },

    #[error("prompt {prompt_id}: invalid '{param}': {reason}")]
    InvalidCheckParam {
        prompt_id: String,
        param: String,
        reason: String,
    },

    #[error("invalid prompt set {path:?}: {reason}")]
    InvalidPromptSet { path: PathBuf, reason: String },

    #[error("duplicate prompt id: {id}")]
    DuplicatePrompt { id: String },

    #[error("prompt {prompt_id} appears more than once in run")]
    DuplicateRecord { prompt_id: String },

    #[error("{context} not found: {value}")]
    NotFound { context: String, value: String },

    // Generic failures (exit code 1)
    #[error("failed to write ledger for {model_id}: {reason}")]
    LedgerWrite { model_id: String, reason: String },

    #[error("ledger for {model_id} is locked by {holder}; delete {lock_path:?} if that process is no longer running")]
    LedgerBusy {
        model_id: String,
        holder: String,
        lock_path: PathBuf,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run interrupted before completion; nothing was written.")]
    Interrupted,

    #[error("{0}")]
    Other(String),
}

impl EvalError {
    /// Create a configuration error
    pub fn config(reason: impl std::fmt::Display) -> Self {
        EvalError::Config {
            reason: reason.to_string(),
        }
    }

    /// Create an error for an invalid value
    pub fn invalid_value(context: &str, value: impl std::fmt::Display) -> Self {
        EvalError::InvalidValue {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an entity that was not found
    pub fn not_found(context: &str, value: impl std::fmt::Display) -> Self {
        EvalError::NotFound {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for a failed ledger write
    pub fn ledger_write(model_id: &str, reason: impl std::fmt::Display) -> Self {
        EvalError::LedgerWrite {
            model_id: model_id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an error for a missing checker parameter
    pub fn missing_param(prompt_id: &str, check_type: &str, param: &str) -> Self {
        EvalError::MissingCheckParam {
            prompt_id: prompt_id.to_string(),
            check_type: check_type.to_string(),
            param: param.to_string(),
        }
    }

    /// Create an error for an invalid checker parameter
    pub fn invalid_param(prompt_id: &str, param: &str, reason: impl std::fmt::Display) -> Self {
        EvalError::InvalidCheckParam {
            prompt_id: prompt_id.to_string(),
            param: param.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            EvalError::Config { .. } | EvalError::UsageError(_) | EvalError::InvalidValue { .. } => {
                ExitCode::Usage
            }

            EvalError::UnknownCheckType { .. }
            | EvalError::MissingCheckParam { .. }
            | EvalError::InvalidCheckParam { .. }
            | EvalError::InvalidPromptSet { .. }
            | EvalError::DuplicatePrompt { .. }
            | EvalError::DuplicateRecord { .. }
            | EvalError::NotFound { .. } => ExitCode::Data,

            EvalError::LedgerWrite { .. }
            | EvalError::LedgerBusy { .. }
            | EvalError::Io(_)
            | EvalError::Yaml(_)
            | EvalError::Json(_)
            | EvalError::Interrupted
            | EvalError::Other(_) => ExitCode::Failure,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            EvalError::Config { .. } => "config_error",
            EvalError::UsageError(_) => "usage_error",
            EvalError::InvalidValue { .. } => "invalid_value",
            EvalError::UnknownCheckType { .. } => "unknown_check_type",
            EvalError::MissingCheckParam { .. } => "missing_check_param",
            EvalError::InvalidCheckParam { .. } => "invalid_check_param",
            EvalError::InvalidPromptSet { .. } => "invalid_prompt_set",
            EvalError::DuplicatePrompt { .. } => "duplicate_prompt",
            EvalError::DuplicateRecord { .. } => "duplicate_record",
            EvalError::NotFound { .. } => "not_found",
            EvalError::LedgerWrite { .. } => "ledger_write_error",
            EvalError::LedgerBusy { .. } => "ledger_busy",
            EvalError::Io(_) => "io_error",
            EvalError::Yaml(_) => "yaml_error",
            EvalError::Json(_) => "json_error",
            EvalError::Interrupted => "interrupted",
            EvalError::Other(_) => "other",
        }
    }

    /// Convert error to JSON representation for structured error output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.exit_code() as i32,
                "type": self.error_type(),
                "message": self.to_string(),
            }
        })
    }
}

/// Result type alias for llm-eval operations
pub type Result<T> = std::result::Result<T, EvalError>;
