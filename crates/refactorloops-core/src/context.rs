use refactorloops_refactor::{RefactorRecord, RefactorRequest};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// What stage of the loop produced a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Generation,
    Validation,
    Correction,
    Outcome,
}

/// One human-readable line of the attempt log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: EntryKind,
    pub text: String,
}

/// Ordered audit trail of one loop run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptLog {
    entries: Vec<LogEntry>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: EntryKind, text: impl Into<String>) {
        self.entries.push(LogEntry {
            kind,
            text: text.into(),
        });
    }

    pub fn count(&self, kind: EntryKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The log as plain lines, in order
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.text.clone()).collect()
    }
}

/// Mutable state of a single loop run
#[derive(Debug)]
pub struct LoopContext<'r> {
    pub request: &'r RefactorRequest,
    pub max_retries: usize,
    /// Record returned by the initial refactor request
    pub record: Option<RefactorRecord>,
    pub log: AttemptLog,
    started_at: Instant,
}

impl<'r> LoopContext<'r> {
    pub fn new(request: &'r RefactorRequest, max_retries: usize) -> Self {
        Self {
            request,
            max_retries,
            record: None,
            log: AttemptLog::new(),
            started_at: Instant::now(),
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Record the model's analysis as generation entries
    pub fn record_generation(&mut self, record: RefactorRecord) {
        self.log.push(
            EntryKind::Generation,
            format!("Algorithmic Flaws: {}", record.analysis),
        );
        self.log.push(
            EntryKind::Generation,
            format!("Proposed Algorithm: {}", record.proposed_algorithm),
        );
        self.log.push(
            EntryKind::Generation,
            format!("Time Before: {}", record.complexity_before),
        );
        self.log.push(
            EntryKind::Generation,
            format!("Time After: {}", record.complexity_after),
        );
        self.record = Some(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refactorloops_checker::Language;

    #[test]
    fn test_attempt_log_keeps_order_and_kinds() {
        let mut log = AttemptLog::new();
        log.push(EntryKind::Validation, "Attempt 1 Failed: bad");
        log.push(EntryKind::Correction, "Correction 1: received 3 lines");
        log.push(EntryKind::Validation, "Validation Passed");

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(EntryKind::Validation), 2);
        assert_eq!(log.count(EntryKind::Outcome), 0);
        assert_eq!(
            log.lines(),
            vec![
                "Attempt 1 Failed: bad",
                "Correction 1: received 3 lines",
                "Validation Passed"
            ]
        );
    }

    #[test]
    fn test_record_generation_writes_analysis_lines() {
        let request = RefactorRequest::new("x = 1", Language::Python);
        let mut context = LoopContext::new(&request, 3);
        context.record_generation(RefactorRecord {
            analysis: "nested loops".to_string(),
            proposed_algorithm: "hash set".to_string(),
            complexity_before: "O(n^2)".to_string(),
            complexity_after: "O(n)".to_string(),
            optimized_code: "x = 1".to_string(),
        });

        assert_eq!(context.log.count(EntryKind::Generation), 4);
        assert_eq!(context.log.lines()[3], "Time After: O(n)");
        assert!(context.record.is_some());
    }
}
