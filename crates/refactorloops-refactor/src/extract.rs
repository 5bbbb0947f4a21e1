use serde_json::{Map, Value};
use tracing::debug;

use crate::record::{normalize_code, RecordField, RefactorRecord};

/// Which recovery strategy produced the JSON object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStrategy {
    /// The whole response was JSON
    Direct,
    /// JSON sat inside a ``` fenced block
    Fenced,
    /// JSON sat between the first `{` and the last `}`
    Braces,
}

/// Fields recovered from model output; any of them may be absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    pub analysis: Option<String>,
    pub proposed_algorithm: Option<String>,
    pub complexity_before: Option<String>,
    pub complexity_after: Option<String>,
    /// Always a string once present, whatever shape the model used
    pub optimized_code: Option<String>,
    pub strategy: ExtractStrategy,
}

impl ExtractedRecord {
    fn from_object(object: &Map<String, Value>, strategy: ExtractStrategy) -> Self {
        let field = |field: RecordField| {
            field
                .accepted_keys()
                .iter()
                .find_map(|key| object.get(*key))
                .map(normalize_code)
        };

        Self {
            analysis: field(RecordField::Analysis),
            proposed_algorithm: field(RecordField::ProposedAlgorithm),
            complexity_before: field(RecordField::ComplexityBefore),
            complexity_after: field(RecordField::ComplexityAfter),
            optimized_code: field(RecordField::OptimizedCode).map(|code| code.trim().to_string()),
            strategy,
        }
    }

    /// Contract fields the model left out
    pub fn missing_fields(&self) -> Vec<RecordField> {
        RecordField::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }

    pub fn get(&self, field: RecordField) -> Option<&str> {
        match field {
            RecordField::Analysis => self.analysis.as_deref(),
            RecordField::ProposedAlgorithm => self.proposed_algorithm.as_deref(),
            RecordField::ComplexityBefore => self.complexity_before.as_deref(),
            RecordField::ComplexityAfter => self.complexity_after.as_deref(),
            RecordField::OptimizedCode => self.optimized_code.as_deref(),
        }
    }

    /// Convert into a full record, or report which fields are missing
    pub fn into_record(self) -> Result<RefactorRecord, Vec<RecordField>> {
        let missing = self.missing_fields();
        match self {
            ExtractedRecord {
                analysis: Some(analysis),
                proposed_algorithm: Some(proposed_algorithm),
                complexity_before: Some(complexity_before),
                complexity_after: Some(complexity_after),
                optimized_code: Some(optimized_code),
                ..
            } => Ok(RefactorRecord {
                analysis,
                proposed_algorithm,
                complexity_before,
                complexity_after,
                optimized_code,
            }),
            _ => Err(missing),
        }
    }
}

/// Recover a structured record from free-form model output.
///
/// Strategies run in order and the first JSON object wins:
/// the whole text, each fenced block, then the outermost `{ ... }` span.
/// Never panics; returns `None` when nothing parses.
pub fn extract(raw: &str) -> Option<ExtractedRecord> {
    let found = parse_object(raw)
        .map(|object| (object, ExtractStrategy::Direct))
        .or_else(|| {
            fenced_blocks(raw)
                .into_iter()
                .find_map(parse_object)
                .map(|object| (object, ExtractStrategy::Fenced))
        })
        .or_else(|| {
            brace_span(raw)
                .and_then(parse_object)
                .map(|object| (object, ExtractStrategy::Braces))
        });

    match found {
        Some((object, strategy)) => {
            debug!(?strategy, keys = object.len(), "Extracted JSON record");
            Some(ExtractedRecord::from_object(&object, strategy))
        }
        None => {
            debug!(raw_len = raw.len(), "No JSON object recoverable");
            None
        }
    }
}

/// Parse text as a JSON object, retrying once with raw control characters escaped
fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let as_object = |value: Value| match value {
        Value::Object(map) => Some(map),
        _ => None,
    };

    match serde_json::from_str::<Value>(text) {
        Ok(value) => as_object(value),
        Err(_) => serde_json::from_str::<Value>(&escape_control_chars(text))
            .ok()
            .and_then(as_object),
    }
}

/// Bodies of ``` fenced blocks; an unterminated fence runs to the end
fn fenced_blocks(raw: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = raw;

    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let first_line = after.split('\n').next().unwrap_or_default();
        let is_tag = first_line
            .trim()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_'));
        let body = match after.find('\n') {
            Some(newline) if is_tag => &after[newline + 1..],
            _ => after,
        };

        match body.find("```") {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + 3..];
            }
            None => {
                blocks.push(body);
                break;
            }
        }
    }

    blocks
}

fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Escape newlines and tabs that models emit unescaped inside JSON strings
fn escape_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out
}
