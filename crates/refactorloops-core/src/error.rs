use refactorloops_model::ModelError;
use refactorloops_refactor::RequestError;
use thiserror::Error;

/// Failures that end a loop run before a candidate can be judged
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Refactor request failed: {0}")]
    Generation(#[from] RequestError),

    #[error("Correction request failed: {0}")]
    Correction(#[from] ModelError),
}

impl LoopError {
    /// Raw model output that caused the failure, if any
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            LoopError::Generation(e) => e.raw(),
            LoopError::Correction(_) => None,
        }
    }
}
