//! Document classification: prompt + document text → typed suggestion.

use serde::{Deserialize, Serialize};

use super::extract::extract_json;
use super::ollama::LlmClient;
use super::LlmError;

/// Upper bound on the document text appended to the prompt.
/// Keeps the request inside typical model context limits.
pub const MAX_INPUT_CHARS: usize = 64_000;

/// Metadata suggested by the model for one document.
///
/// Every field is optional; names are free text, not yet resolved to
/// document-service ids. `tags` distinguishes "absent" from an explicit
/// empty list, both of which mean no tags were suggested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Suggestion {
    pub title: Option<String>,
    pub created: Option<String>,
    pub correspondent: Option<String>,
    pub document_type: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl Suggestion {
    pub fn tag_names(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }
}

/// Classifies documents with a fixed model behind an `LlmClient`.
pub struct Classifier<'a> {
    llm: &'a dyn LlmClient,
    model: &'a str,
}

impl<'a> Classifier<'a> {
    pub fn new(llm: &'a dyn LlmClient, model: &'a str) -> Self {
        Self { llm, model }
    }

    /// One structured completion over the rendered prompt and the
    /// (truncated) document text, recovered into a `Suggestion`.
    ///
    /// Unknown response fields are ignored and missing ones default to
    /// absent; any transport or extraction failure propagates so the
    /// caller can leave the document for the next cycle.
    pub fn classify(&self, prompt: &str, document_text: &str) -> Result<Suggestion, LlmError> {
        let text = truncate_chars(document_text, MAX_INPUT_CHARS);
        let full_prompt = format!("{prompt}\n\n{text}");

        tracing::debug!(
            model = self.model,
            prompt_chars = full_prompt.chars().count(),
            "requesting classification"
        );
        let raw = self.llm.generate_structured(self.model, &full_prompt)?;
        tracing::debug!(raw_len = raw.len(), "model completion received");

        let value = extract_json(&raw)?;
        serde_json::from_value(value).map_err(|e| LlmError::ResponseParsing(e.to_string()))
    }
}

/// Truncate to a character count without splitting a code point.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
