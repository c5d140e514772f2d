//! OpenAI-compatible `/chat/completions` adapter

use std::time::Duration;

use serde_json::{json, Value};
use ureq::Agent;

use super::http;
use crate::capability::{Completion, GenerationParams, Provider, ProviderError};
use crate::ledger::Usage;

pub struct OpenAiProvider {
    name: String,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    agent: Agent,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            agent: http::agent(timeout),
            timeout,
        }
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Completion, ProviderError> {
        let mut body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        http::apply_params(&mut body, params)?;

        let auth = self.api_key.as_ref().map(|k| format!("Bearer {}", k));
        let headers: Vec<(&str, &str)> = auth
            .as_deref()
            .map(|value| vec![("Authorization", value)])
            .unwrap_or_default();

        let reply = http::post_json(&self.agent, &self.endpoint, &headers, &body, self.timeout)?;
        parse_reply(&reply)
    }
}

fn parse_reply(reply: &Value) -> Result<Completion, ProviderError> {
    let content = reply
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| {
            ProviderError::InvalidResponse("missing choices[0].message.content".to_string())
        })?;

    let usage = reply.get("usage");
    let tokens = |field: &str| usage.and_then(|u| u.get(field)).and_then(Value::as_u64);

    Ok(Completion {
        content: content.to_string(),
        usage: Usage {
            input_tokens: tokens("prompt_tokens"),
            output_tokens: tokens("completion_tokens"),
            cost_usd: None,
        },
        api_model: reply.get("model").and_then(Value::as_str).map(str::to_string),
    })
}
