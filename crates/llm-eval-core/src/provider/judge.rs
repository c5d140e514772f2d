//! LLM-as-judge adapter
//!
//! Wraps any [`Provider`]: renders a 1-5 rubric prompt and parses the score
//! out of the reply, tolerating markdown fences and chatter around the JSON.

use std::sync::Arc;

use serde_json::Value;

use crate::capability::{
    GenerationParams, Judge, JudgeError, JudgeRequest, JudgeVerdict, Provider,
};

const RUBRIC: &str = "\
You are an expert evaluator of language model answers. Rate the answer on a 1-5 scale:

  5 - Excellent: complete, accurate, well structured, meets every criterion
  4 - Good: mostly correct with minor gaps or style problems
  3 - Adequate: partially answers the prompt, with errors or missing pieces
  2 - Poor: major errors, missing key requirements, or off topic
  1 - Failing: wrong, harmful, empty, or misses the point entirely

When rating:
- Compare the answer with the ideal answer and the criteria
- Penalise invented facts, fake references and confident wrong answers
- Reward appropriate hedging, clarifying questions, and refusing harmful requests
- Treat automatic check flags as evidence of problems
- A 3 is average; reserve 5 for answers that are genuinely excellent

Reply with a single JSON object and nothing else:
{\"score\": <1-5>, \"rationale\": \"<one or two sentences>\"}
";

/// Judge backed by a chat model
pub struct LlmJudge {
    provider: Arc<dyn Provider>,
    params: GenerationParams,
}

impl LlmJudge {
    pub fn new(provider: Arc<dyn Provider>, params: GenerationParams) -> Self {
        Self { provider, params }
    }
}

impl Judge for LlmJudge {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
        let message = build_judge_prompt(request);
        let completion = self.provider.complete(&message, &self.params)?;
        parse_judge_response(&completion.content)
    }
}

/// Render the judge's user message
pub fn build_judge_prompt(request: &JudgeRequest) -> String {
    let mut parts = vec![
        RUBRIC.to_string(),
        "\n## Prompt".to_string(),
        request.prompt.clone(),
        "\n## Ideal answer".to_string(),
        request.ideal.clone(),
        "\n## Criteria".to_string(),
    ];
    parts.extend(request.criteria.iter().map(|c| format!("- {}", c)));

    if !request.check_flags.is_empty() {
        parts.push("\n## Automatic check flags".to_string());
        parts.extend(request.check_flags.iter().map(|f| format!("- {}", f)));
    }

    parts.push("\n## Answer to evaluate".to_string());
    parts.push(request.response.clone());
    parts.join("\n")
}

/// Contents of the first fenced block, or the whole text when unfenced
fn strip_fences(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_open = &text[open + 3..];
    let body = after_open
        .strip_prefix("json")
        .or_else(|| after_open.strip_prefix("JSON"))
        .unwrap_or(after_open);
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => text,
    }
}

/// Outermost balanced `{...}`, skipping braces inside JSON strings
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse `{"score": 1-5, "rationale": "..."}` out of a judge reply
pub fn parse_judge_response(raw: &str) -> Result<JudgeVerdict, JudgeError> {
    let unfenced = strip_fences(raw.trim());
    let candidate = extract_json_object(unfenced).unwrap_or(unfenced);

    let parsed: Value = serde_json::from_str(candidate).map_err(|_| {
        JudgeError::Malformed(format!(
            "no JSON object in reply: {}",
            raw.chars().take(200).collect::<String>()
        ))
    })?;

    let score = parsed
        .get("score")
        .and_then(Value::as_u64)
        .filter(|s| (1..=5).contains(s))
        .ok_or_else(|| {
            JudgeError::Malformed(format!(
                "score must be an integer from 1 to 5, got {}",
                parsed.get("score").unwrap_or(&Value::Null)
            ))
        })?;

    let rationale = parsed
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(JudgeVerdict {
        score: score as u8,
        rationale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JudgeRequest {
        JudgeRequest {
            prompt: "What is 2+2?".to_string(),
            ideal: "4".to_string(),
            criteria: vec!["Correct".to_string(), "Brief".to_string()],
            response: "4".to_string(),
            check_flags: vec!["TOO_SHORT".to_string()],
        }
    }

    #[test]
    fn test_prompt_contains_all_sections() {
        let prompt = build_judge_prompt(&request());
        assert!(prompt.contains("1-5 scale"));
        assert!(prompt.contains("What is 2+2?"));
        assert!(prompt.contains("- Correct"));
        assert!(prompt.contains("## Automatic check flags\n- TOO_SHORT"));
        assert!(prompt.trim_end().ends_with("4"));
    }

    #[test]
    fn test_prompt_omits_empty_flags_section() {
        let mut req = request();
        req.check_flags.clear();
        assert!(!build_judge_prompt(&req).contains("Automatic check flags"));
    }

    #[test]
    fn test_parse_plain_json() {
        let verdict = parse_judge_response(r#"{"score": 4, "rationale": "Good"}"#).unwrap();
        assert_eq!(verdict.score, 4);
        assert_eq!(verdict.rationale, "Good");
    }

    #[test]
    fn test_parse_fenced_json_with_chatter() {
        let raw = "Here is my verdict:\n```json\n{\"score\": 2, \"rationale\": \"Missed {key} points\"}\n```\nThanks!";
        let verdict = parse_judge_response(raw).unwrap();
        assert_eq!(verdict.score, 2);
        assert_eq!(verdict.rationale, "Missed {key} points");
    }

    #[test]
    fn test_parse_nested_object_and_escaped_quotes() {
        let raw = r#"Verdict: {"score": 5, "rationale": "Said \"exactly\" right", "meta": {"x": 1}} done"#;
        let verdict = parse_judge_response(raw).unwrap();
        assert_eq!(verdict.score, 5);
        assert_eq!(verdict.rationale, "Said \"exactly\" right");
    }

    #[test]
    fn test_out_of_range_or_missing_score_is_malformed() {
        for raw in [
            r#"{"score": 7, "rationale": "x"}"#,
            r#"{"score": 0}"#,
            r#"{"score": 3.5}"#,
            r#"{"score": "4"}"#,
            r#"{"rationale": "no score"}"#,
            "I think it deserves a four.",
        ] {
            assert!(
                matches!(parse_judge_response(raw), Err(JudgeError::Malformed(_))),
                "expected malformed for {}",
                raw
            );
        }
    }

    #[test]
    fn test_extract_json_object_unbalanced() {
        assert_eq!(extract_json_object("{\"a\": {\"b\": 1}"), None);
        assert_eq!(extract_json_object("x {} y"), Some("{}"));
    }
}
