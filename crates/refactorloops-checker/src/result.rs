use serde::{Deserialize, Serialize};

/// Classification of a single validation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Code is structurally valid
    Valid,
    /// Code has a syntax defect
    Invalid,
    /// Code was not a string
    Format,
    /// The language's toolchain could not be run
    ToolUnavailable,
    /// The toolchain did not finish within the wall-clock limit
    TimedOut,
    /// No validator exists for the requested language
    Unsupported,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Valid => "valid",
            Verdict::Invalid => "invalid",
            Verdict::Format => "format",
            Verdict::ToolUnavailable => "tool_unavailable",
            Verdict::TimedOut => "timed_out",
            Verdict::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub verdict: Verdict,
    pub message: String,
    /// 1-based line of the first defect, when known
    pub line: Option<usize>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            verdict: Verdict::Valid,
            message: "Valid".to_string(),
            line: None,
        }
    }

    pub fn invalid(message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            verdict: Verdict::Invalid,
            message: message.into(),
            line,
        }
    }

    pub fn format_error(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Format,
            message: message.into(),
            line: None,
        }
    }

    pub fn tool_unavailable(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::ToolUnavailable,
            message: message.into(),
            line: None,
        }
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::TimedOut,
            message: message.into(),
            line: None,
        }
    }

    pub fn unsupported(language: &str) -> Self {
        Self {
            verdict: Verdict::Unsupported,
            message: format!("Unsupported language: {}", language),
            line: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }

    /// Whether asking the model for a fix could change the verdict
    pub fn is_retryable(&self) -> bool {
        matches!(self.verdict, Verdict::Invalid | Verdict::Format)
    }
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
