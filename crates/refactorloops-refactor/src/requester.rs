use refactorloops_checker::Language;
use refactorloops_model::{ChatModel, ChatRequest, ModelError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extract::extract;
use crate::record::{RecordField, RefactorRecord, RefactorRequest};
use crate::PromptPolicy;

/// Why a refactor request produced no usable record
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("No JSON object could be recovered from the model output")]
    Unparsable { raw: String },

    #[error("Model output is missing required fields: {}", join_fields(.missing))]
    MissingFields {
        missing: Vec<RecordField>,
        raw: String,
    },
}

impl RequestError {
    /// Raw model output, when the model answered at all
    pub fn raw(&self) -> Option<&str> {
        match self {
            RequestError::Model(_) => None,
            RequestError::Unparsable { raw } | RequestError::MissingFields { raw, .. } => {
                Some(raw)
            }
        }
    }
}

fn join_fields(fields: &[RecordField]) -> String {
    fields
        .iter()
        .map(|f| f.contract_key())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sends refactor and correction prompts to a model and recovers its answers
pub struct RefactorRequester<'a> {
    model: &'a dyn ChatModel,
    policy: &'a dyn PromptPolicy,
}

impl<'a> RefactorRequester<'a> {
    pub fn new(model: &'a dyn ChatModel, policy: &'a dyn PromptPolicy) -> Self {
        Self { model, policy }
    }

    pub fn policy(&self) -> &dyn PromptPolicy {
        self.policy
    }

    /// Ask the model for a refactored program and its analysis
    pub async fn request(&self, request: &RefactorRequest) -> Result<RefactorRecord, RequestError> {
        let chat = ChatRequest::new(self.policy.refactor_messages(request))
            .with_temperature(self.policy.refactor_temperature())
            .with_json_output(true);

        debug!(
            model = self.model.model(),
            policy = self.policy.name(),
            language = %request.language,
            prompt_len = chat.prompt_len(),
            "Requesting refactor"
        );

        let raw = self.model.chat(&chat).await?;

        info!(response_len = raw.len(), "Model answered refactor request");

        let Some(extracted) = extract(&raw) else {
            warn!(raw = %raw, "Discarding unparsable model output");
            return Err(RequestError::Unparsable { raw });
        };

        extracted.into_record().map_err(|missing| {
            warn!(
                raw = %raw,
                missing = %join_fields(&missing),
                "Model output is missing required fields"
            );
            RequestError::MissingFields { missing, raw }
        })
    }

    /// Ask the model to repair a candidate; yields the recovered code or `""`
    pub async fn correct(
        &self,
        language: Language,
        failing_code: &str,
        error: &str,
    ) -> Result<String, ModelError> {
        let chat = ChatRequest::new(self.policy.correction_messages(language, failing_code, error))
            .with_temperature(self.policy.correction_temperature())
            .with_json_output(true);

        debug!(
            language = %language,
            prompt_len = chat.prompt_len(),
            "Requesting correction"
        );

        let raw = self.model.chat(&chat).await?;

        match extract(&raw).and_then(|record| record.optimized_code) {
            Some(code) => Ok(code),
            None => {
                warn!(raw = %raw, "Correction output has no code");
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StrictPolicy;
    use async_trait::async_trait;
    use refactorloops_model::ProviderKind;
    use std::sync::Mutex;

    /// Replays canned answers and remembers the requests it saw
    struct CannedModel {
        answers: Mutex<Vec<Result<String, ModelError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl CannedModel {
        fn new(answers: Vec<Result<String, ModelError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        fn name(&self) -> &str {
            "Canned"
        }

        fn provider(&self) -> ProviderKind {
            ProviderKind::Ollama
        }

        fn model(&self) -> &str {
            "canned"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<String, ModelError> {
            self.seen.lock().unwrap().push(request.clone());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(ModelError::EmptyResponse))
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    const ANSWER: &str = r#"Here you go:
```json
{"algorithmic_flaws": "quadratic scan", "proposed_optimal_algorithm": "set", "time_complexity_before": "O(n^2)", "time_complexity_after": "O(n)", "optimized_code": ["def f(xs):", "    return len(set(xs)) != len(xs)"]}
```"#;

    fn request() -> RefactorRequest {
        RefactorRequest::new("def f(xs): ...", Language::Python)
    }

    #[tokio::test]
    async fn test_request_returns_normalized_record() {
        let model = CannedModel::new(vec![Ok(ANSWER.to_string())]);
        let requester = RefactorRequester::new(&model, &StrictPolicy);

        let record = requester.request(&request()).await.unwrap();
        assert_eq!(record.complexity_after, "O(n)");
        assert_eq!(
            record.optimized_code,
            "def f(xs):\n    return len(set(xs)) != len(xs)"
        );

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, 0.0);
        assert!(seen[0].json_output);
    }

    #[tokio::test]
    async fn test_request_unparsable() {
        let model = CannedModel::new(vec![Ok("I would rather not.".to_string())]);
        let requester = RefactorRequester::new(&model, &StrictPolicy);

        let err = requester.request(&request()).await.unwrap_err();
        assert!(matches!(err, RequestError::Unparsable { .. }));
        assert_eq!(err.raw(), Some("I would rather not."));
    }

    #[tokio::test]
    async fn test_request_missing_fields() {
        let model = CannedModel::new(vec![Ok(r#"{"optimized_code": "x = 1"}"#.to_string())]);
        let requester = RefactorRequester::new(&model, &StrictPolicy);

        match requester.request(&request()).await.unwrap_err() {
            RequestError::MissingFields { missing, .. } => {
                assert_eq!(missing.len(), 4);
                assert!(!missing.contains(&RecordField::OptimizedCode));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_request_model_error() {
        let model = CannedModel::new(vec![Err(ModelError::Network("refused".to_string()))]);
        let requester = RefactorRequester::new(&model, &StrictPolicy);

        let err = requester.request(&request()).await.unwrap_err();
        assert!(matches!(err, RequestError::Model(ModelError::Network(_))));
        assert!(err.raw().is_none());
    }

    #[tokio::test]
    async fn test_correct_extracts_code_or_empty() {
        let model = CannedModel::new(vec![
            Ok(r#"{"optimized_code": "x = 2"}"#.to_string()),
            Ok("no json here".to_string()),
        ]);
        let requester = RefactorRequester::new(&model, &StrictPolicy);

        let fixed = requester
            .correct(Language::Python, "x = ", "Syntax Error")
            .await
            .unwrap();
        assert_eq!(fixed, "x = 2");

        let fixed = requester
            .correct(Language::Python, "x = ", "Syntax Error")
            .await
            .unwrap();
        assert_eq!(fixed, "");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].temperature, 0.1);
        assert!(seen[0].messages[0].content.contains("x = "));
    }
}
