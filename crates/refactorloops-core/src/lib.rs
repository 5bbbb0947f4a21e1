//! # refactorloops-core
//!
//! The reflection loop: ask a model for a refactor, validate the candidate, and feed
//! checker errors back to the model until the code is valid or the retry budget runs out.

mod context;
mod error;
mod loop_runner;
mod outcome;

pub use context::{AttemptLog, EntryKind, LogEntry, LoopContext};
pub use error::LoopError;
pub use loop_runner::{LoopRunner, DEFAULT_MAX_RETRIES};
pub use outcome::RefactorOutcome;
