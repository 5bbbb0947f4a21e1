use refactorloops_checker::Language;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One refactor job as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactorRequest {
    pub source_code: String,
    pub language: Language,
    /// Advisory coding standards injected into the prompt
    pub context: String,
}

impl RefactorRequest {
    pub fn new(source_code: impl Into<String>, language: Language) -> Self {
        Self {
            source_code: source_code.into(),
            language,
            context: String::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Structured answer recovered from the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactorRecord {
    pub analysis: String,
    pub proposed_algorithm: String,
    pub complexity_before: String,
    pub complexity_after: String,
    pub optimized_code: String,
}

/// Fields of the output contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Analysis,
    ProposedAlgorithm,
    ComplexityBefore,
    ComplexityAfter,
    OptimizedCode,
}

impl RecordField {
    pub const ALL: [RecordField; 5] = [
        RecordField::Analysis,
        RecordField::ProposedAlgorithm,
        RecordField::ComplexityBefore,
        RecordField::ComplexityAfter,
        RecordField::OptimizedCode,
    ];

    /// Key the prompt asks the model to use
    pub fn contract_key(&self) -> &'static str {
        self.accepted_keys()[0]
    }

    /// Every key accepted for this field, contract key first
    pub fn accepted_keys(&self) -> &'static [&'static str] {
        match self {
            RecordField::Analysis => &["algorithmic_flaws", "analysis"],
            RecordField::ProposedAlgorithm => &["proposed_optimal_algorithm", "proposed_algorithm"],
            RecordField::ComplexityBefore => &["time_complexity_before", "complexity_before"],
            RecordField::ComplexityAfter => &["time_complexity_after", "complexity_after"],
            RecordField::OptimizedCode => &["optimized_code", "corrected_code"],
        }
    }
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.contract_key())
    }
}

/// Coerce any JSON value into a single string.
///
/// Strings pass through; arrays and objects are flattened element by element (object
/// values in document order) and joined with `\n`; null becomes empty; numbers and
/// booleans keep their JSON text.
pub fn normalize_code(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(normalize_code).collect::<Vec<_>>().join("\n"),
        Value::Object(map) => map.values().map(normalize_code).collect::<Vec<_>>().join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_string_is_identity() {
        assert_eq!(normalize_code(&json!("x = 1\ny = 2")), "x = 1\ny = 2");
    }

    #[test]
    fn test_normalize_list_joins_lines() {
        let value = json!(["def f():", "    return 1"]);
        assert_eq!(normalize_code(&value), "def f():\n    return 1");
    }

    #[test]
    fn test_normalize_mapping_keeps_document_order() {
        let value = json!({"2": "first = True", "10": "second = True", "1": "third = True"});
        assert_eq!(
            normalize_code(&value),
            "first = True\nsecond = True\nthird = True"
        );
    }

    #[test]
    fn test_normalize_nested_and_scalars() {
        let value = json!([["a = 1", "b = 2"], {"k": "c = 3"}, 42, true, null]);
        assert_eq!(normalize_code(&value), "a = 1\nb = 2\nc = 3\n42\ntrue\n");
    }

    #[test]
    fn test_contract_keys() {
        assert_eq!(RecordField::OptimizedCode.contract_key(), "optimized_code");
        assert_eq!(RecordField::Analysis.to_string(), "algorithmic_flaws");
    }
}
