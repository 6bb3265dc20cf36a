//! Runtime configuration: CLI flags with environment fallbacks.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::llm::LlmError;
use crate::paperless::PaperlessError;

/// Fatal startup problems. The process exits with status 1 before any
/// polling begins.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("manual mode requires --doc-id")]
    MissingDocumentId,

    #[error("cannot read prompt template {path}: {source}")]
    PromptTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document service initialization failed: {0}")]
    Paperless(#[from] PaperlessError),

    #[error("model service initialization failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Poll for unprocessed documents until the process is terminated.
    Auto,
    /// Process a single document given by --doc-id, then exit.
    Manual,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Where the classification input text comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OcrSource {
    /// Text the document service extracted at ingest time.
    DocumentService,
    /// Page images rendered from the original and read by the vision model.
    ModelVision,
}

impl fmt::Display for OcrSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DocumentService => write!(f, "document-service"),
            Self::ModelVision => write!(f, "model-vision"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "docent",
    version,
    about = "Enriches Paperless-ngx documents with metadata suggested by a local LLM"
)]
pub struct Settings {
    /// Base URL of the document service.
    #[arg(long, env = "PAPERLESS_URL")]
    pub paperless_url: String,

    /// API token for the document service.
    #[arg(long, env = "PAPERLESS_TOKEN", hide_env_values = true)]
    pub paperless_token: String,

    /// Name of the boolean custom field marking documents as processed.
    #[arg(long, env = "PROCESSED_FIELD", default_value = "AI Processed")]
    pub processed_field: String,

    /// Base URL of the model service.
    #[arg(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Model used for classification and vision OCR.
    #[arg(long, env = "OLLAMA_MODEL")]
    pub ollama_model: String,

    /// Path to the prompt template file.
    #[arg(long, env = "PROMPT_FILE", default_value = "prompt.txt")]
    pub prompt_file: PathBuf,

    /// Default log filter, overridden by RUST_LOG when set.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Replace existing document tags instead of merging with them.
    #[arg(
        long,
        env = "OVERRIDE_EXISTING_TAGS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub override_existing_tags: bool,

    /// Source of the text sent to the classifier.
    #[arg(long, env = "OCR_SOURCE", value_enum, default_value_t = OcrSource::DocumentService)]
    pub ocr_source: OcrSource,

    /// Page-count limit for vision OCR; larger documents fall back to
    /// the document-service text.
    #[arg(long, env = "MAX_VISION_PAGES", default_value_t = 10)]
    pub max_vision_pages: usize,

    /// Seconds to sleep between polling cycles.
    #[arg(long, env = "SCAN_INTERVAL", default_value_t = 600)]
    pub scan_interval: u64,

    /// Execution mode.
    #[arg(long, value_enum, default_value_t = RunMode::Auto)]
    pub mode: RunMode,

    /// Document id to process in manual mode.
    #[arg(long)]
    pub doc_id: Option<u32>,

    /// Log the planned update without applying it.
    #[arg(long)]
    pub dry_run: bool,
}

impl Settings {
    /// Cross-field checks clap cannot express.
    pub fn validate(&self) -> Result<(), InitError> {
        if self.mode == RunMode::Manual && self.doc_id.is_none() {
            return Err(InitError::MissingDocumentId);
        }
        Ok(())
    }
}
