//! Secondary automated scorer backed by a chat model
//!
//! Asks for one 0-1 rating per configured metric and validates every value.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::judge::extract_json_object;
use crate::capability::{GenerationParams, Provider, ScorerError, SecondaryScorer};

pub struct LlmScorer {
    provider: Arc<dyn Provider>,
    metrics: Vec<String>,
    params: GenerationParams,
}

impl LlmScorer {
    pub fn new(provider: Arc<dyn Provider>, metrics: Vec<String>, params: GenerationParams) -> Self {
        Self {
            provider,
            metrics,
            params,
        }
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    fn build_prompt(&self, prompt: &str, response: &str) -> String {
        let keys = self
            .metrics
            .iter()
            .map(|m| format!("\"{}\": <0.0-1.0>", m))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Rate the answer below on each metric from 0.0 (worst) to 1.0 (best).\n\
             Metrics: {}\n\n\
             Reply with a single JSON object and nothing else:\n{{{}}}\n\n\
             ## Prompt\n{}\n\n## Answer\n{}",
            self.metrics.join(", "),
            keys,
            prompt,
            response
        )
    }
}

impl SecondaryScorer for LlmScorer {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn score(&self, prompt: &str, response: &str) -> Result<BTreeMap<String, f64>, ScorerError> {
        let message = self.build_prompt(prompt, response);
        let completion = self.provider.complete(&message, &self.params)?;
        parse_metrics(&completion.content, &self.metrics)
    }
}

/// Extract and validate one value per expected metric
pub fn parse_metrics(raw: &str, metrics: &[String]) -> Result<BTreeMap<String, f64>, ScorerError> {
    let candidate = extract_json_object(raw)
        .ok_or_else(|| ScorerError::Malformed("no JSON object in reply".to_string()))?;
    let parsed: Value = serde_json::from_str(candidate)
        .map_err(|e| ScorerError::Malformed(format!("invalid JSON: {}", e)))?;

    metrics
        .iter()
        .map(|metric| {
            let value = parsed
                .get(metric)
                .ok_or_else(|| ScorerError::Malformed(format!("missing metric '{}'", metric)))?
                .as_f64()
                .ok_or_else(|| {
                    ScorerError::Malformed(format!("metric '{}' is not a number", metric))
                })?;
            if !(0.0..=1.0).contains(&value) {
                return Err(ScorerError::Malformed(format!(
                    "metric '{}' out of range: {}",
                    metric, value
                )));
            }
            Ok((metric.clone(), value))
        })
        .collect()
}
