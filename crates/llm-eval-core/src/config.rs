//! Evaluation configuration
//!
//! Loaded once from a YAML file, validated, and then passed around
//! immutably. Relative paths inside the file resolve against the directory
//! that contains it.

pub mod types;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::bail_config;
use crate::error::{EvalError, Result};

pub use types::{
    EvalConfig, EvalSettings, JudgeConfig, ModelConfig, PathsConfig, ProviderKind,
    SecondaryConfig,
};

/// Config file used when neither `--config` nor `LLM_EVAL_CONFIG` is given
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "LLM_EVAL_CONFIG";

impl EvalConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EvalError::config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_yaml_str(&content).map_err(|e| match e {
            EvalError::Config { reason } => {
                EvalError::config(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        debug!(
            path = %path.display(),
            models = config.models.len(),
            judge = config.judge.is_some(),
            secondary = config.secondary.is_some(),
            "config_loaded"
        );
        Ok(config)
    }

    /// Parse and validate YAML; relative paths resolve against the cwd
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: EvalConfig =
            serde_yaml::from_str(content).map_err(EvalError::config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;

        for (name, model) in &self.models {
            if model.model.trim().is_empty() {
                bail_config!("models.{}.model must not be empty", name);
            }
        }

        if let Some(judge) = &self.judge {
            if !self.models.contains_key(&judge.model) {
                bail_config!("judge.model '{}' is not defined in models", judge.model);
            }
        }

        if let Some(secondary) = &self.secondary {
            if !self.models.contains_key(&secondary.model) {
                bail_config!(
                    "secondary.model '{}' is not defined in models",
                    secondary.model
                );
            }
            if secondary.metrics.is_empty() {
                bail_config!("secondary.metrics must list at least one metric");
            }
        }

        let eval = &self.eval;
        if eval.concurrency == 0 {
            bail_config!("eval.concurrency must be at least 1");
        }
        if eval.max_attempts == 0 {
            bail_config!("eval.max_attempts must be at least 1");
        }
        if eval.timeout_secs == 0 {
            bail_config!("eval.timeout_secs must be at least 1");
        }
        if Duration::try_from_secs_f64(eval.delay_between_calls).is_err() {
            bail_config!(
                "eval.delay_between_calls must be a non-negative number of seconds, got {}",
                eval.delay_between_calls
            );
        }
        Ok(())
    }

    /// Look up a model by its local name
    pub fn model(&self, name: &str) -> Result<&ModelConfig> {
        self.models.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.models.keys().map(String::as_str).collect();
            EvalError::not_found(
                "model",
                format!("{} (configured: {})", name, known.join(", ")),
            )
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn prompts_path(&self) -> PathBuf {
        self.resolve(&self.paths.prompts)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.resolve(&self.paths.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
models:
  gpt-4o:
    provider: openai
    model: gpt-4o
    params: { temperature: 0.0, max_tokens: 2048 }
  claude-sonnet:
    provider: anthropic
    model: claude-sonnet-4-5
    api_key_env: MY_ANTHROPIC_KEY
judge:
  model: claude-sonnet
secondary:
  model: gpt-4o
scoring:
  judge_weight: 0.7
  secondary_weight: 0.3
eval:
  concurrency: 4
  delay_between_calls: 0.5
paths:
  prompts: prompts.yaml
  results: out
"#;

    #[test]
    fn test_full_config_parses() {
        let config = EvalConfig::from_yaml_str(FULL).unwrap();
        assert_eq!(config.models.len(), 2);
        let claude = config.model("claude-sonnet").unwrap();
        assert_eq!(claude.provider, ProviderKind::Anthropic);
        assert_eq!(claude.api_key_env(), "MY_ANTHROPIC_KEY");
        assert_eq!(claude.base_url(), "https://api.anthropic.com");
        assert_eq!(config.model("gpt-4o").unwrap().api_key_env(), "OPENAI_API_KEY");
        assert_eq!(config.scoring.judge_weight, 0.7);
        assert_eq!(config.eval.concurrency, 4);
        assert_eq!(config.eval.max_attempts, 3);
        assert_eq!(
            config.secondary.as_ref().unwrap().metrics,
            vec!["correctness", "coherence", "instruction_following"]
        );
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = EvalConfig::from_yaml_str("models:\n  m:\n    model: local\n").unwrap();
        assert!(config.judge.is_none());
        assert!(config.secondary.is_none());
        assert_eq!(config.scoring, crate::score::Weights::default());
        assert_eq!(config.eval.timeout_secs, 120);
        assert_eq!(config.paths.results, PathBuf::from("results"));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let err = EvalConfig::from_yaml_str(
            "scoring:\n  judge_weight: 0.9\n  secondary_weight: 0.9\n",
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::Config { .. }));
        assert_eq!(err.exit_code(), crate::error::ExitCode::Usage);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = EvalConfig::from_yaml_str("models:\n  m:\n    provider: carrier-pigeon\n    model: x\n")
            .unwrap_err();
        assert!(matches!(err, EvalError::Config { .. }));
    }

    #[test]
    fn test_undefined_judge_model_rejected() {
        let err = EvalConfig::from_yaml_str("models: {}\njudge:\n  model: ghost\n").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = EvalConfig::from_yaml_str("eval:\n  concurrency: 0\n").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_out_of_range_delay_rejected() {
        for delay in ["-1.0", "1.0e300", ".nan"] {
            let yaml = format!("eval:\n  delay_between_calls: {}\n", delay);
            let err = EvalConfig::from_yaml_str(&yaml).unwrap_err();
            assert!(err.to_string().contains("delay_between_calls"), "{}", delay);
        }
    }

    #[test]
    fn test_unknown_model_is_not_found() {
        let config = EvalConfig::from_yaml_str("models:\n  m:\n    model: x\n").unwrap();
        assert!(matches!(config.model("nope"), Err(EvalError::NotFound { .. })));
    }

    #[test]
    fn test_paths_resolve_against_config_dir() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", FULL).unwrap();
        let config = EvalConfig::load(file.path()).unwrap();
        let dir = file.path().parent().unwrap();
        assert_eq!(config.prompts_path(), dir.join("prompts.yaml"));
        assert_eq!(config.results_dir(), dir.join("out"));
    }
}
