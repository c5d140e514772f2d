//! Concrete provider, judge and scorer adapters
//!
//! Built from [`EvalConfig`] entries. Everything here is reached only through
//! the traits in [`crate::capability`].

mod anthropic;
mod http;
mod judge;
mod openai;
mod scorer;

pub use anthropic::AnthropicProvider;
pub use judge::{build_judge_prompt, extract_json_object, parse_judge_response, LlmJudge};
pub use openai::OpenAiProvider;
pub use scorer::{parse_metrics, LlmScorer};

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::capability::{Judge, Provider, SecondaryScorer};
use crate::config::{EvalConfig, ModelConfig, ProviderKind};
use crate::error::Result;

/// HTTP provider for a configured model
pub fn build_provider(name: &str, model: &ModelConfig, timeout: Duration) -> Arc<dyn Provider> {
    let api_key = http::read_api_key(model.api_key_env(), name);
    debug!(
        model = name,
        provider = model.provider.as_str(),
        base_url = model.base_url(),
        "provider_built"
    );
    match model.provider {
        ProviderKind::Openai => Arc::new(OpenAiProvider::new(
            name,
            &model.model,
            model.base_url(),
            api_key,
            timeout,
        )),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
            name,
            &model.model,
            model.base_url(),
            api_key,
            timeout,
        )),
    }
}

fn timeout_of(config: &EvalConfig) -> Duration {
    Duration::from_secs(config.eval.timeout_secs)
}

/// Provider for the model under evaluation
pub fn provider_for(config: &EvalConfig, name: &str) -> Result<Arc<dyn Provider>> {
    let model = config.model(name)?;
    Ok(build_provider(name, model, timeout_of(config)))
}

/// Judge from the `judge` section, if configured
pub fn judge_for(config: &EvalConfig) -> Result<Option<Arc<dyn Judge>>> {
    let Some(section) = &config.judge else {
        return Ok(None);
    };
    let provider = provider_for(config, &section.model)?;
    Ok(Some(Arc::new(LlmJudge::new(provider, section.params.clone()))))
}

/// Secondary scorer from the `secondary` section, if configured
pub fn scorer_for(config: &EvalConfig) -> Result<Option<Arc<dyn SecondaryScorer>>> {
    let Some(section) = &config.secondary else {
        return Ok(None);
    };
    let provider = provider_for(config, &section.model)?;
    Ok(Some(Arc::new(LlmScorer::new(
        provider,
        section.metrics.clone(),
        section.params.clone(),
    ))))
}
