//! Configuration type definitions

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::GenerationParams;
use crate::retry::RetryPolicy;
use crate::score::Weights;

/// Wire protocol spoken by a model endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions`
    #[default]
    Openai,
    /// Anthropic Messages API
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the API key when none is configured
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
        }
    }
}

/// One model endpoint, keyed by its local name in `models`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name sent to the API
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default)]
    pub params: GenerationParams,
}

impl ModelConfig {
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Key into `models`
    pub model: String,

    #[serde(default)]
    pub params: GenerationParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryConfig {
    /// Key into `models`
    pub model: String,

    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,

    #[serde(default)]
    pub params: GenerationParams,
}

fn default_metrics() -> Vec<String> {
    ["correctness", "coherence", "instruction_following"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Execution settings for evaluation runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Seconds each worker pauses between prompts
    #[serde(default)]
    pub delay_between_calls: f64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_concurrency() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            delay_between_calls: 0.0,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl EvalSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Pause between calls; values rejected by validation yield no pause
    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_between_calls).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_prompts_path")]
    pub prompts: PathBuf,

    #[serde(default = "default_results_dir")]
    pub results: PathBuf,
}

fn default_prompts_path() -> PathBuf {
    PathBuf::from("evals/default.json")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prompts: default_prompts_path(),
            results: default_results_dir(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<SecondaryConfig>,

    #[serde(default)]
    pub scoring: Weights,

    #[serde(default)]
    pub eval: EvalSettings,

    #[serde(default)]
    pub paths: PathsConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub(crate) base_dir: PathBuf,
}
