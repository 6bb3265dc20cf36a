pub mod planner;
pub mod poll;
pub mod processor;

pub use planner::*;
pub use poll::*;
pub use processor::*;

use thiserror::Error;

use crate::llm::LlmError;
use crate::paperless::PaperlessError;

/// Failure of a single document's processing. Caught and logged at the
/// per-document boundary; other documents and the cycle continue.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Paperless(#[from] PaperlessError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}
