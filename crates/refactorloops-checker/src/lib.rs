//! # refactorloops-checker
//!
//! Structural validation of model-generated code.
//!
//! Python is first parsed in-process with a tree-sitter grammar, then confirmed by
//! the interpreter's own `ast.parse`. C, C++ and Java are handed to the system
//! compiler in syntax-only mode. Either way the toolchain runs against a scratch
//! file that is removed once it returns.
//!
//! ## Key Types
//!
//! - [`SyntaxChecker`] - Language-aware checker
//! - [`Validator`] - Seam used by the reflection loop
//! - [`ValidationResult`] / [`Verdict`] - Outcome of one check
//! - [`CodeMetrics`] - Complexity metrics for before/after comparison

mod checker;
mod compiler;
mod language;
pub mod metrics;
mod python;
mod result;

pub use checker::{CheckerConfig, SyntaxChecker, Validator};
pub use compiler::{rename_public_type, JAVA_PLACEHOLDER_CLASS};
pub use language::Language;
pub use metrics::{analyze, CodeMetrics, MetricsComparison};
pub use result::{ValidationResult, Verdict};
