use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for the refactor loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RefactorStarted {
        language: String,
        policy: String,
        model: String,
        source_lines: usize,
        max_retries: usize,
    },
    GenerationStarted {
        model: String,
    },
    GenerationCompleted {
        duration_secs: f64,
    },
    GenerationFailed {
        error: String,
    },
    /// Model output that could not be turned into a record
    RawOutputDiscarded {
        reason: String,
        raw_preview: String,
    },
    ValidationStarted {
        attempt: usize,
    },
    ValidationCompleted {
        attempt: usize,
        verdict: String,
        message: String,
    },
    CorrectionStarted {
        correction: usize,
        max_retries: usize,
    },
    CorrectionCompleted {
        correction: usize,
        code_lines: usize,
    },
    RefactorCompleted {
        corrections: usize,
        duration_secs: f64,
        heuristic_before: f64,
        heuristic_after: f64,
    },
    RetriesExhausted {
        corrections: usize,
        last_error: String,
    },
    ToolFailure {
        message: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for refactor loop events, writing to stderr and optionally a JSONL file
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let _ = writeln!(file, "{}", event.with_timestamp());
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::RefactorStarted {
                language,
                policy,
                model,
                source_lines,
                max_retries,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} {}",
                    "┌".bright_blue(),
                    "refactorloops".bold().bright_white(),
                    format!("{} · {} lines", language, source_lines).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{} {} {}  {} {}  {} {}",
                    "│".bright_blue(),
                    "Model:".dimmed(),
                    model,
                    "Policy:".dimmed(),
                    policy,
                    "Retries:".dimmed(),
                    max_retries
                );
                let _ = writeln!(stderr);
            }
            LogEvent::GenerationStarted { model } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_cyan(),
                    "GENERATE".bright_cyan().bold(),
                    model.dimmed()
                );
            }
            LogEvent::GenerationCompleted { duration_secs } => {
                let _ = writeln!(
                    stderr,
                    "    {} Done ({:.1}s)",
                    "✓".bright_green(),
                    duration_secs
                );
            }
            LogEvent::GenerationFailed { error } => {
                let _ = writeln!(
                    stderr,
                    "    {} Generation failed: {}",
                    "✗".bright_red(),
                    error.bright_red()
                );
            }
            LogEvent::RawOutputDiscarded {
                reason,
                raw_preview,
            } => {
                let _ = writeln!(stderr, "    {} {}", "⚠".bright_yellow(), reason);
                for line in raw_preview.lines() {
                    let _ = writeln!(stderr, "{} {}", "    │".dimmed(), line.dimmed());
                }
            }
            LogEvent::ValidationStarted { attempt } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_magenta(),
                    "VALIDATE".bright_magenta().bold(),
                    format!("#{}", attempt).dimmed()
                );
            }
            LogEvent::ValidationCompleted {
                verdict, message, ..
            } => {
                if verdict == "valid" {
                    let _ = writeln!(stderr, "    {} {}", "✓".bright_green(), message);
                } else {
                    let _ = writeln!(
                        stderr,
                        "    {} {}",
                        "✗".bright_red(),
                        format!("{}: {}", verdict, first_line(message)).bright_red()
                    );
                }
            }
            LogEvent::CorrectionStarted {
                correction,
                max_retries,
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_yellow(),
                    "CORRECT".bright_yellow().bold(),
                    format!("{}/{}", correction, max_retries).dimmed()
                );
            }
            LogEvent::CorrectionCompleted { code_lines, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} {} lines returned",
                    "→".bright_yellow(),
                    code_lines
                );
            }
            LogEvent::RefactorCompleted {
                corrections,
                duration_secs,
                heuristic_before,
                heuristic_after,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} after {} correction{} ({:.1}s), heuristic {:.2} → {:.2}",
                    "└".bright_blue(),
                    "Valid".bright_green().bold(),
                    corrections,
                    if *corrections == 1 { "" } else { "s" },
                    duration_secs,
                    heuristic_before,
                    heuristic_after
                );
            }
            LogEvent::RetriesExhausted {
                corrections,
                last_error,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Retries exhausted after {} corrections: {}",
                    "⚠".bright_yellow(),
                    corrections,
                    first_line(last_error)
                );
            }
            LogEvent::ToolFailure { message } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Validation tool failure: {}",
                    "✗".bright_red(),
                    message.bright_red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RefactorStarted {
                language, policy, ..
            } => format!("[{}] refactor:start {} {}", timestamp, language, policy),
            LogEvent::GenerationStarted { model } => {
                format!("[{}] generate:start {}", timestamp, model)
            }
            LogEvent::GenerationCompleted { duration_secs } => {
                format!("[{}] generate:done {:.1}s", timestamp, duration_secs)
            }
            LogEvent::GenerationFailed { error } => {
                format!("[{}] generate:failed {}", timestamp, error)
            }
            LogEvent::RawOutputDiscarded { reason, .. } => {
                format!("[{}] generate:discarded {}", timestamp, reason)
            }
            LogEvent::ValidationStarted { attempt } => {
                format!("[{}] validate:start:{}", timestamp, attempt)
            }
            LogEvent::ValidationCompleted {
                attempt, verdict, ..
            } => format!("[{}] validate:done:{} {}", timestamp, attempt, verdict),
            LogEvent::CorrectionStarted {
                correction,
                max_retries,
            } => format!(
                "[{}] correct:start:{}/{}",
                timestamp, correction, max_retries
            ),
            LogEvent::CorrectionCompleted {
                correction,
                code_lines,
            } => format!(
                "[{}] correct:done:{} {} lines",
                timestamp, correction, code_lines
            ),
            LogEvent::RefactorCompleted {
                corrections,
                duration_secs,
                ..
            } => format!(
                "[{}] refactor:done corrections={} {:.1}s",
                timestamp, corrections, duration_secs
            ),
            LogEvent::RetriesExhausted { corrections, .. } => {
                format!("[{}] refactor:exhausted corrections={}", timestamp, corrections)
            }
            LogEvent::ToolFailure { message } => {
                format!("[{}] tool:failure {}", timestamp, first_line(message))
            }
        };
        let _ = writeln!(std::io::stderr(), "{}", msg);
    }
}

/// Shorten model output for display, respecting char boundaries
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
