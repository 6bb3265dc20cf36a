//! Blocking HTTP client for an Ollama-compatible model service.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::LlmError;

/// Fixed per-request timeout for model calls.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Model service abstraction (allows mocking).
pub trait LlmClient: Send + Sync {
    /// Non-streaming completion in JSON output mode.
    fn generate_structured(&self, model: &str, prompt: &str) -> Result<String, LlmError>;

    /// Non-streaming vision completion over base64-encoded page images.
    fn generate_with_images(
        &self,
        model: &str,
        prompt: &str,
        images: &[String],
    ) -> Result<String, LlmError>;
}

/// Request body for `/api/generate`.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
}

/// Response body from `/api/generate`.
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Response body from `/api/tags`.
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

pub struct OllamaClient {
    base_url: String,
    http: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            timeout_secs,
        })
    }

    fn send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::NotReachable(self.base_url.clone())
        } else if e.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::Http(e.to_string())
        }
    }

    fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;
        Ok(parsed.response)
    }

    /// Installed model names from `/api/tags`.
    pub fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.http.get(&url).send().map_err(|e| self.send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    pub fn is_model_available(&self, model: &str) -> Result<bool, LlmError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }
}

impl LlmClient for OllamaClient {
    fn generate_structured(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        self.generate(&GenerateRequest {
            model,
            prompt,
            stream: false,
            format: Some("json"),
            images: None,
        })
    }

    fn generate_with_images(
        &self,
        model: &str,
        prompt: &str,
        images: &[String],
    ) -> Result<String, LlmError> {
        self.generate(&GenerateRequest {
            model,
            prompt,
            stream: false,
            format: None,
            images: Some(images),
        })
    }
}

/// Mock model client for tests.
///
/// Structured calls drain `structured_queue` first and then fall back to
/// the default response; image calls drain `image_queue`, failing pages
/// where the queued entry is an `Err`. All prompts are recorded.
pub struct MockLlmClient {
    default_response: Result<String, String>,
    structured_queue: Mutex<VecDeque<Result<String, String>>>,
    image_queue: Mutex<VecDeque<Result<String, String>>>,
    structured_prompts: Mutex<Vec<String>>,
    image_prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            default_response: Ok(response.to_string()),
            structured_queue: Mutex::new(VecDeque::new()),
            image_queue: Mutex::new(VecDeque::new()),
            structured_prompts: Mutex::new(Vec::new()),
            image_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            default_response: Err(message.to_string()),
            structured_queue: Mutex::new(VecDeque::new()),
            image_queue: Mutex::new(VecDeque::new()),
            structured_prompts: Mutex::new(Vec::new()),
            image_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_structured_sequence(self, responses: Vec<Result<String, String>>) -> Self {
        *self.structured_queue.lock().unwrap() = responses.into();
        self
    }

    pub fn with_image_sequence(self, responses: Vec<Result<String, String>>) -> Self {
        *self.image_queue.lock().unwrap() = responses.into();
        self
    }

    pub fn structured_prompts(&self) -> Vec<String> {
        self.structured_prompts.lock().unwrap().clone()
    }

    pub fn image_calls(&self) -> usize {
        self.image_prompts.lock().unwrap().len()
    }
}

impl LlmClient for MockLlmClient {
    fn generate_structured(&self, _model: &str, prompt: &str) -> Result<String, LlmError> {
        self.structured_prompts.lock().unwrap().push(prompt.to_string());
        let next = self
            .structured_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone());
        next.map_err(LlmError::Http)
    }

    fn generate_with_images(
        &self,
        _model: &str,
        prompt: &str,
        _images: &[String],
    ) -> Result<String, LlmError> {
        self.image_prompts.lock().unwrap().push(prompt.to_string());
        let next = self
            .image_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone());
        next.map_err(LlmError::Http)
    }
}
