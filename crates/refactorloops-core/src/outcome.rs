use refactorloops_checker::MetricsComparison;
use refactorloops_refactor::RefactorRecord;
use serde::Serialize;
use std::time::Duration;

use crate::AttemptLog;

pub const STATUS_SUCCESS: &str = "Success";
pub const STATUS_EXHAUSTED: &str = "Max retries reached";

/// The terminal state of one reflection loop run
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefactorOutcome {
    /// The candidate passed validation
    Success {
        code: String,
        corrections: usize,
        record: RefactorRecord,
        metrics: MetricsComparison,
        log: AttemptLog,
        total_duration_secs: f64,
    },
    /// Every correction was spent and the last candidate is still invalid
    RetriesExhausted {
        code: String,
        corrections: usize,
        last_error: String,
        record: RefactorRecord,
        log: AttemptLog,
        total_duration_secs: f64,
    },
    /// The model could not produce a usable answer
    GenerationFailed {
        error: String,
        /// Latest candidate when the failure happened during a correction
        last_code: Option<String>,
        log: AttemptLog,
        total_duration_secs: f64,
    },
    /// The validator could not judge the candidate (compiler missing, timeout, unsupported)
    ToolFailure {
        code: String,
        message: String,
        record: RefactorRecord,
        log: AttemptLog,
        total_duration_secs: f64,
    },
}

impl RefactorOutcome {
    pub fn success(
        code: String,
        corrections: usize,
        record: RefactorRecord,
        metrics: MetricsComparison,
        log: AttemptLog,
        duration: Duration,
    ) -> Self {
        Self::Success {
            code,
            corrections,
            record,
            metrics,
            log,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn retries_exhausted(
        code: String,
        corrections: usize,
        last_error: String,
        record: RefactorRecord,
        log: AttemptLog,
        duration: Duration,
    ) -> Self {
        Self::RetriesExhausted {
            code,
            corrections,
            last_error,
            record,
            log,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn generation_failed(
        error: String,
        last_code: Option<String>,
        log: AttemptLog,
        duration: Duration,
    ) -> Self {
        Self::GenerationFailed {
            error,
            last_code,
            log,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn tool_failure(
        code: String,
        message: String,
        record: RefactorRecord,
        log: AttemptLog,
        duration: Duration,
    ) -> Self {
        Self::ToolFailure {
            code,
            message,
            record,
            log,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    /// Human-readable status line
    pub fn status(&self) -> String {
        match self {
            Self::Success { .. } => STATUS_SUCCESS.to_string(),
            Self::RetriesExhausted { .. } => STATUS_EXHAUSTED.to_string(),
            Self::GenerationFailed { error, .. } => format!("Generation failed: {}", error),
            Self::ToolFailure { message, .. } => format!("Validation tool failure: {}", message),
        }
    }

    /// Final candidate code, if any was produced
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Success { code, .. }
            | Self::RetriesExhausted { code, .. }
            | Self::ToolFailure { code, .. } => Some(code),
            Self::GenerationFailed { last_code, .. } => last_code.as_deref(),
        }
    }

    pub fn log(&self) -> &AttemptLog {
        match self {
            Self::Success { log, .. }
            | Self::RetriesExhausted { log, .. }
            | Self::GenerationFailed { log, .. }
            | Self::ToolFailure { log, .. } => log,
        }
    }

    pub fn corrections(&self) -> usize {
        match self {
            Self::Success { corrections, .. } | Self::RetriesExhausted { corrections, .. } => {
                *corrections
            }
            Self::GenerationFailed { .. } | Self::ToolFailure { .. } => {
                self.log().count(crate::EntryKind::Correction)
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Caller-facing triple: final code, status, log lines
    pub fn into_parts(self) -> (Option<String>, String, Vec<String>) {
        let status = self.status();
        let lines = self.log().lines();
        let code = match self {
            Self::Success { code, .. }
            | Self::RetriesExhausted { code, .. }
            | Self::ToolFailure { code, .. } => Some(code),
            Self::GenerationFailed { last_code, .. } => last_code,
        };
        (code, status, lines)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success { .. } => 0,
            Self::RetriesExhausted { .. } => 1,
            Self::GenerationFailed { .. } => 2,
            Self::ToolFailure { .. } => 3,
        }
    }
}
