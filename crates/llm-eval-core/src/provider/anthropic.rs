//! Anthropic Messages API adapter

use std::time::Duration;

use serde_json::{json, Value};
use ureq::Agent;

use super::http;
use crate::capability::{Completion, GenerationParams, Provider, ProviderError};
use crate::ledger::Usage;

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    name: String,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    agent: Agent,
    timeout: Duration,
}

impl AnthropicProvider {
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
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            api_key,
            agent: http::agent(timeout),
            timeout,
        }
    }
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Completion, ProviderError> {
        // max_tokens is mandatory for this API
        let mut body = json!({
            "model": self.model,
            "max_tokens": params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": [{"role": "user", "content": prompt}],
        });
        http::apply_params(&mut body, params)?;

        let mut headers = vec![("anthropic-version", API_VERSION)];
        if let Some(key) = self.api_key.as_deref() {
            headers.push(("x-api-key", key));
        }

        let reply = http::post_json(&self.agent, &self.endpoint, &headers, &body, self.timeout)?;
        parse_reply(&reply)
    }
}

fn parse_reply(reply: &Value) -> Result<Completion, ProviderError> {
    let blocks = reply
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidResponse("missing content blocks".to_string()))?;

    let content = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");

    let usage = reply.get("usage");
    let tokens = |field: &str| usage.and_then(|u| u.get(field)).and_then(Value::as_u64);

    Ok(Completion {
        content,
        usage: Usage {
            input_tokens: tokens("input_tokens"),
            output_tokens: tokens("output_tokens"),
            cost_usd: None,
        },
        api_model: reply.get("model").and_then(Value::as_str).map(str::to_string),
    })
}
