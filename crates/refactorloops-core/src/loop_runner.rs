use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use refactorloops_checker::{Language, MetricsComparison, ValidationResult, Validator};
use refactorloops_knowledge::{advisory_context, ContextProvider, NoContext};
use refactorloops_logging::{preview, LogEvent, Logger};
use refactorloops_model::ChatModel;
use refactorloops_refactor::{PromptPolicy, RefactorRequest, RefactorRequester};

use crate::context::{EntryKind, LoopContext};
use crate::error::LoopError;
use crate::outcome::RefactorOutcome;

pub const DEFAULT_MAX_RETRIES: usize = 3;

const DEFAULT_MAX_RULES: usize = 2;
const RAW_PREVIEW_CHARS: usize = 400;

/// States of the reflection loop
#[derive(Debug)]
enum LoopState {
    Generating,
    Validating {
        candidate: String,
        corrections: usize,
    },
    Correcting {
        candidate: String,
        error: String,
        corrections: usize,
    },
    Done {
        code: String,
        corrections: usize,
    },
    Exhausted {
        code: String,
        corrections: usize,
        last_error: String,
    },
    Failed {
        error: LoopError,
        last_code: Option<String>,
    },
    ToolFailure {
        code: String,
        result: ValidationResult,
    },
}

impl LoopState {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Done { .. }
                | LoopState::Exhausted { .. }
                | LoopState::Failed { .. }
                | LoopState::ToolFailure { .. }
        )
    }
}

/// Orchestrates generate, validate and correct until the code is valid or the budget is spent
pub struct LoopRunner<'a> {
    model: &'a dyn ChatModel,
    requester: RefactorRequester<'a>,
    validator: &'a dyn Validator,
    context_provider: &'a dyn ContextProvider,
    max_rules: usize,
    logger: Arc<Logger>,
}

impl<'a> LoopRunner<'a> {
    pub fn new(
        model: &'a dyn ChatModel,
        policy: &'a dyn PromptPolicy,
        validator: &'a dyn Validator,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            model,
            requester: RefactorRequester::new(model, policy),
            validator,
            context_provider: &NoContext,
            max_rules: DEFAULT_MAX_RULES,
            logger,
        }
    }

    /// Inject advisory rules into every request built by [`LoopRunner::refactor`]
    pub fn with_context_provider(mut self, provider: &'a dyn ContextProvider, max_rules: usize) -> Self {
        self.context_provider = provider;
        self.max_rules = max_rules;
        self
    }

    /// Build a request for `source_code` with advisory context attached
    pub fn prepare(&self, source_code: &str, language: Language) -> RefactorRequest {
        let context = advisory_context(self.context_provider, source_code, self.max_rules);
        RefactorRequest::new(source_code, language).with_context(context)
    }

    /// Refactor `source_code`, returning the final code, a status line and the attempt log
    pub async fn refactor(
        &self,
        source_code: &str,
        language: Language,
        max_retries: usize,
    ) -> (Option<String>, String, Vec<String>) {
        let request = self.prepare(source_code, language);
        self.run(&request, max_retries).await.into_parts()
    }

    /// Run the loop to a terminal state
    pub async fn run(&self, request: &RefactorRequest, max_retries: usize) -> RefactorOutcome {
        let mut context = LoopContext::new(request, max_retries);

        self.logger.log(&LogEvent::RefactorStarted {
            language: request.language.to_string(),
            policy: self.requester.policy().name().to_string(),
            model: self.model.model().to_string(),
            source_lines: request.source_code.lines().count(),
            max_retries,
        });

        let mut state = LoopState::Generating;
        while !state.is_terminal() {
            state = self.step(state, &mut context).await;
        }

        self.finish(state, context)
    }

    async fn step(&self, state: LoopState, context: &mut LoopContext<'_>) -> LoopState {
        match state {
            LoopState::Generating => match self.generate(context).await {
                Ok(candidate) => LoopState::Validating {
                    candidate,
                    corrections: 0,
                },
                Err(error) => LoopState::Failed {
                    error,
                    last_code: None,
                },
            },
            LoopState::Validating {
                candidate,
                corrections,
            } => self.validate(candidate, corrections, context).await,
            LoopState::Correcting {
                candidate,
                error,
                corrections,
            } => self.correct(candidate, error, corrections, context).await,
            terminal => terminal,
        }
    }

    async fn generate(&self, context: &mut LoopContext<'_>) -> Result<String, LoopError> {
        self.logger.log(&LogEvent::GenerationStarted {
            model: self.model.model().to_string(),
        });
        let started = Instant::now();

        let record = self.requester.request(context.request).await?;

        self.logger.log(&LogEvent::GenerationCompleted {
            duration_secs: started.elapsed().as_secs_f64(),
        });

        let candidate = record.optimized_code.clone();
        context.record_generation(record);
        Ok(candidate)
    }

    async fn validate(
        &self,
        candidate: String,
        corrections: usize,
        context: &mut LoopContext<'_>,
    ) -> LoopState {
        let attempt = corrections + 1;
        self.logger.log(&LogEvent::ValidationStarted { attempt });

        let result = if candidate.trim().is_empty() {
            ValidationResult::invalid("Empty code returned by the model.", None)
        } else {
            self.validator.check(&candidate, context.request.language).await
        };

        self.logger.log(&LogEvent::ValidationCompleted {
            attempt,
            verdict: result.verdict.to_string(),
            message: result.message.clone(),
        });

        if result.is_valid() {
            context.log.push(EntryKind::Validation, "Validation Passed");
            return LoopState::Done {
                code: candidate,
                corrections,
            };
        }

        context.log.push(
            EntryKind::Validation,
            format!("Attempt {} Failed: {}", attempt, result.message),
        );

        if !result.is_retryable() {
            warn!(verdict = %result.verdict, "Validator could not judge the candidate");
            return LoopState::ToolFailure {
                code: candidate,
                result,
            };
        }

        if corrections < context.max_retries {
            LoopState::Correcting {
                candidate,
                error: result.message,
                corrections,
            }
        } else {
            LoopState::Exhausted {
                code: candidate,
                corrections,
                last_error: result.message,
            }
        }
    }

    async fn correct(
        &self,
        candidate: String,
        error: String,
        corrections: usize,
        context: &mut LoopContext<'_>,
    ) -> LoopState {
        let correction = corrections + 1;
        self.logger.log(&LogEvent::CorrectionStarted {
            correction,
            max_retries: context.max_retries,
        });

        match self
            .requester
            .correct(context.request.language, &candidate, &error)
            .await
        {
            Ok(code) => {
                let code_lines = code.lines().count();
                self.logger.log(&LogEvent::CorrectionCompleted {
                    correction,
                    code_lines,
                });
                let text = if code.is_empty() {
                    format!("Correction {}: no code recovered", correction)
                } else {
                    format!("Correction {}: received {} lines", correction, code_lines)
                };
                context.log.push(EntryKind::Correction, text);
                LoopState::Validating {
                    candidate: code,
                    corrections: correction,
                }
            }
            Err(e) => LoopState::Failed {
                error: e.into(),
                last_code: Some(candidate),
            },
        }
    }

    fn finish(&self, state: LoopState, mut context: LoopContext<'_>) -> RefactorOutcome {
        let duration = context.total_duration();
        let record = context.record.take();

        match (state, record) {
            (LoopState::Done { code, corrections }, Some(record)) => {
                let metrics = MetricsComparison::compare(
                    &context.request.source_code,
                    &code,
                    context.request.language,
                );
                self.logger.log(&LogEvent::RefactorCompleted {
                    corrections,
                    duration_secs: duration.as_secs_f64(),
                    heuristic_before: metrics.before.heuristic(),
                    heuristic_after: metrics.after.heuristic(),
                });
                info!(corrections, "Refactor accepted");
                context.log.push(
                    EntryKind::Outcome,
                    format!("Accepted after {} corrections", corrections),
                );
                RefactorOutcome::success(code, corrections, record, metrics, context.log, duration)
            }
            (
                LoopState::Exhausted {
                    code,
                    corrections,
                    last_error,
                },
                Some(record),
            ) => {
                self.logger.log(&LogEvent::RetriesExhausted {
                    corrections,
                    last_error: last_error.clone(),
                });
                context.log.push(
                    EntryKind::Outcome,
                    format!("Max retries reached after {} corrections", corrections),
                );
                RefactorOutcome::retries_exhausted(
                    code,
                    corrections,
                    last_error,
                    record,
                    context.log,
                    duration,
                )
            }
            (LoopState::ToolFailure { code, result }, Some(record)) => {
                self.logger.log(&LogEvent::ToolFailure {
                    message: result.message.clone(),
                });
                context.log.push(
                    EntryKind::Outcome,
                    format!("Validation tool failure: {}", result.message),
                );
                RefactorOutcome::tool_failure(code, result.message, record, context.log, duration)
            }
            (LoopState::Failed { error, last_code }, _) => {
                if let Some(raw) = error.raw_output() {
                    self.logger.log(&LogEvent::RawOutputDiscarded {
                        reason: error.to_string(),
                        raw_preview: preview(raw, RAW_PREVIEW_CHARS),
                    });
                }
                self.logger.log(&LogEvent::GenerationFailed {
                    error: error.to_string(),
                });
                warn!(error = %error, "Reflection loop failed");
                context
                    .log
                    .push(EntryKind::Outcome, format!("Generation failed: {}", error));
                RefactorOutcome::generation_failed(error.to_string(), last_code, context.log, duration)
            }
            (state, _) => {
                debug!(?state, "Loop stopped without a refactor record");
                RefactorOutcome::generation_failed(
                    "No refactor record was produced".to_string(),
                    None,
                    context.log,
                    duration,
                )
            }
        }
    }
}
