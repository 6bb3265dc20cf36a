pub mod classify;
pub mod extract;
pub mod ollama;
pub mod vision;

pub use classify::*;
pub use extract::*;
pub use ollama::*;
pub use vision::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("model service is not reachable at {0}")]
    NotReachable(String),

    #[error("model service returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("model request timed out after {0}s")]
    Timeout(u64),

    #[error("model request failed: {0}")]
    Http(String),

    /// No JSON object could be recovered from the completion.
    /// Carries the full raw text for diagnostics.
    #[error("could not extract a JSON object from the model response")]
    MalformedResponse { raw: String },

    #[error("model response did not match the expected shape: {0}")]
    ResponseParsing(String),
}
