//! JSON recovery from free-form model completions.
//!
//! Models asked for JSON still wrap it in prose or code fences often
//! enough that three recovery strategies are tried in order:
//! the whole text, the first ```json fenced block, then the span from
//! the first `{` to the last `}`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::LlmError;

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap());

/// Recover a JSON object from raw model text.
///
/// Only objects satisfy a strategy; a completion that parses to an array
/// or scalar falls through to the next strategy. When all strategies
/// fail, the error carries the original text for diagnostics. No retries
/// happen at this layer.
pub fn extract_json(text: &str) -> Result<Value, LlmError> {
    if let Some(object) = parse_object(text) {
        return Ok(object);
    }

    if let Some(captures) = FENCED_JSON.captures(text) {
        if let Some(interior) = captures.get(1) {
            if let Some(object) = parse_object(interior.as_str()) {
                return Ok(object);
            }
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(object) = parse_object(&text[start..=end]) {
                return Ok(object);
            }
        }
    }

    Err(LlmError::MalformedResponse {
        raw: text.to_string(),
    })
}

fn parse_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate.trim())
        .ok()
        .filter(|value| value.is_object())
}
