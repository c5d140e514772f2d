//! Shared JSON-over-HTTP plumbing for the provider adapters

use std::time::Duration;

use serde_json::Value;
use tracing::trace;
use ureq::Agent;

use crate::capability::ProviderError;

/// Longest error body excerpt kept in an error message
const ERROR_BODY_LIMIT: usize = 300;

pub(crate) fn agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// POST a JSON body and return the parsed JSON reply
///
/// Non-2xx statuses are classified with [`ProviderError::from_status`].
pub(crate) fn post_json(
    agent: &Agent,
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
    timeout: Duration,
) -> Result<Value, ProviderError> {
    let payload = serde_json::to_string(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("cannot encode request: {}", e)))?;

    let mut request = agent.post(url).header("Content-Type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let mut response = request.send(payload).map_err(|e| match e {
        ureq::Error::Timeout(_) => ProviderError::Timeout(timeout),
        other => ProviderError::Transport(other.to_string()),
    })?;

    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ProviderError::Transport(format!("cannot read response body: {}", e)))?;
    trace!(url, status, bytes = text.len(), "http_response");

    if !(200..300).contains(&status) {
        return Err(ProviderError::from_status(status, excerpt(&text)));
    }

    serde_json::from_str(&text)
        .map_err(|e| ProviderError::InvalidResponse(format!("body is not JSON: {}", e)))
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= ERROR_BODY_LIMIT {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{}...", cut)
    }
}

/// Merge sampling parameters into a request body object
pub(crate) fn apply_params(
    body: &mut Value,
    params: &crate::capability::GenerationParams,
) -> Result<(), ProviderError> {
    let encoded = serde_json::to_value(params)
        .map_err(|e| ProviderError::Config(format!("invalid params: {}", e)))?;
    if let (Some(target), Value::Object(fields)) = (body.as_object_mut(), encoded) {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
    Ok(())
}

pub(crate) fn read_api_key(env_var: &str, provider: &str) -> Option<String> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => {
            tracing::warn!(
                provider,
                env_var,
                "API key environment variable is not set; requests will be unauthenticated"
            );
            None
        }
    }
}
