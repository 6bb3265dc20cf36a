pub mod client;
pub mod taxonomy;
pub mod types;

pub use client::*;
pub use taxonomy::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaperlessError {
    #[error("document service is not reachable at {0}")]
    Unreachable(String),

    #[error("document service returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("document service request failed: {0}")]
    Transport(String),

    #[error("unexpected document service response: {0}")]
    ResponseShape(String),

    #[error("API token contains characters that cannot be sent in a header")]
    InvalidToken,

    #[error("custom field '{0}' could not be resolved after creating it")]
    MarkerField(String),
}
