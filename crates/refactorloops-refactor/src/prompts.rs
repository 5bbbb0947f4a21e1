use refactorloops_checker::Language;
use refactorloops_model::ChatMessage;

use crate::record::RecordField;
use crate::RefactorRequest;

/// Interchangeable prompt-building strategy for the refactor loop
pub trait PromptPolicy: Send + Sync {
    /// Short identifier (e.g., "strict")
    fn name(&self) -> &str;

    /// Messages for the initial refactor request
    fn refactor_messages(&self, request: &RefactorRequest) -> Vec<ChatMessage>;

    /// Messages asking the model to repair a candidate that failed validation
    fn correction_messages(
        &self,
        language: Language,
        failing_code: &str,
        error: &str,
    ) -> Vec<ChatMessage> {
        vec![ChatMessage::user(build_correction_prompt(
            language,
            failing_code,
            error,
        ))]
    }

    fn refactor_temperature(&self) -> f32 {
        0.0
    }

    fn correction_temperature(&self) -> f32 {
        0.1
    }
}

/// Available prompt policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolicyKind {
    #[default]
    Strict,
    Conservative,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::Strict => write!(f, "strict"),
            PolicyKind::Conservative => write!(f, "conservative"),
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(PolicyKind::Strict),
            "conservative" | "minimal" => Ok(PolicyKind::Conservative),
            _ => Err(format!("Unknown prompt policy: {}", s)),
        }
    }
}

/// Create a prompt policy by kind
pub fn create_policy(kind: PolicyKind) -> Box<dyn PromptPolicy> {
    match kind {
        PolicyKind::Strict => Box::new(StrictPolicy),
        PolicyKind::Conservative => Box::new(ConservativePolicy),
    }
}

/// Canonical policy: aggressive optimisation, professional renaming of locals
pub struct StrictPolicy;

impl PromptPolicy for StrictPolicy {
    fn name(&self) -> &str {
        "strict"
    }

    fn refactor_messages(&self, request: &RefactorRequest) -> Vec<ChatMessage> {
        let language = request.language;
        let style_rule = match language {
            Language::Python => "Add type hints and a docstring to every function.".to_string(),
            other => format!(
                "Follow idiomatic {} conventions and keep the program self-contained.",
                other.display_name()
            ),
        };

        let rules = [
            "Improve the algorithmic time complexity wherever possible.".to_string(),
            "Rename local variables professionally for clarity, but keep every externally visible function, method and class signature exactly as it is.".to_string(),
            style_rule,
            "Return the COMPLETE rewritten program, never a fragment or a diff.".to_string(),
            "Return ONLY valid JSON: no prose, no markdown fences.".to_string(),
        ];

        vec![
            ChatMessage::system(build_system_prompt(
                &format!("You are an elite senior {} engineer.", language.display_name()),
                &rules,
                request,
            )),
            ChatMessage::user(request.source_code.clone()),
        ]
    }
}

/// Minimal-change policy: no renaming, smallest edit achieving the improvement
pub struct ConservativePolicy;

impl PromptPolicy for ConservativePolicy {
    fn name(&self) -> &str {
        "conservative"
    }

    fn refactor_messages(&self, request: &RefactorRequest) -> Vec<ChatMessage> {
        let language = request.language;
        let rules = [
            "Make the smallest change that improves the algorithmic time complexity.".to_string(),
            "Do not rename anything: identifiers, signatures, classes and files keep their original names.".to_string(),
            "Preserve comments and formatting of the lines you do not change.".to_string(),
            "Return the COMPLETE program, never a fragment or a diff.".to_string(),
            "Return ONLY valid JSON: no prose, no markdown fences.".to_string(),
        ];

        vec![
            ChatMessage::system(build_system_prompt(
                &format!(
                    "You are a careful {} maintainer reviewing production code.",
                    language.display_name()
                ),
                &rules,
                request,
            )),
            ChatMessage::user(request.source_code.clone()),
        ]
    }
}

fn build_system_prompt(persona: &str, rules: &[String], request: &RefactorRequest) -> String {
    let numbered = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {}", i + 1, rule))
        .collect::<Vec<_>>()
        .join("\n");

    let standards = if request.context.trim().is_empty() {
        "No specific rules found."
    } else {
        request.context.trim()
    };

    format!(
        r#"{persona}
Target language: {language}

STRICT RULES:
{rules}

CODING STANDARDS:
{standards}

REQUIRED JSON FORMAT:
{contract}"#,
        persona = persona,
        language = request.language.display_name(),
        rules = numbered,
        standards = standards,
        contract = output_contract(request.language),
    )
}

/// The five-key JSON object every refactor answer must be
fn output_contract(language: Language) -> String {
    let lines = RecordField::ALL
        .iter()
        .map(|field| {
            let placeholder = match field {
                RecordField::OptimizedCode => format!(
                    "FULL COMPLETE {} CODE",
                    language.display_name().to_uppercase()
                ),
                _ => "...".to_string(),
            };
            format!("    \"{}\": \"{}\"", field.contract_key(), placeholder)
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!("{{\n{}\n}}", lines)
}

/// Build the repair prompt; failing code and checker message are embedded verbatim
pub fn build_correction_prompt(language: Language, failing_code: &str, error: &str) -> String {
    format!(
        r#"Fix this {language} syntax error.

Error:
{error}

Broken Code:
{code}

Return ONLY corrected JSON of the form {{"{key}": "FULL CORRECTED {upper} CODE"}}."#,
        language = language.display_name(),
        error = error,
        code = failing_code,
        key = RecordField::OptimizedCode.contract_key(),
        upper = language.display_name().to_uppercase(),
    )
}
