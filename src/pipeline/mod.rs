//! Request orchestration
//!
//! normalize -> match -> extract -> build, or delegate to the fallback when
//! there is no intent or the intent lacks its label. Execution is a
//! separate, optional step.

pub mod request;

pub use request::{CommandRequest, CommandResponse, MAX_RAW_COMMAND_CHARS};

use crate::command::{normalize, CommandBuilder, CommandExecutor, FilterExtractor, IntentMatcher, Vocabulary};
use crate::core::config::DEFAULT_MODEL;
use crate::core::error::{AgentError, Result};
use crate::core::types::{is_executable_command, CommandExecutionResult, GeneratedCommand, UsageInfo};
use crate::llm::{FallbackAdapter, FallbackError};
use crate::usage::{NullSink, RecordSink, RequestLog, UsageLog};
use std::sync::Arc;
use uuid::Uuid;

/// Which path produced (or failed to produce) the command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Built from the intent table
    Rule { intent: String },
    /// Delegated; `intent` is set when an intent matched but lacked its label
    Fallback { intent: Option<String> },
}

/// Result of translating one request
#[derive(Debug, Clone)]
pub struct Translation {
    pub normalized: String,
    pub route: Route,
    pub outcome: std::result::Result<GeneratedCommand, FallbackError>,
}

impl Translation {
    /// Usage to account for, whether or not a command came out
    pub fn usage(&self) -> Option<UsageInfo> {
        match &self.outcome {
            Ok(generated) => generated.usage,
            Err(e) => e.usage,
        }
    }
}

/// Translation pipeline plus optional execution
pub struct CommandPipeline<F> {
    matcher: IntentMatcher,
    extractor: FilterExtractor,
    fallback: F,
    executor: CommandExecutor,
    sink: Arc<dyn RecordSink>,
    model: String,
}

impl<F: FallbackAdapter> CommandPipeline<F> {
    pub fn new(vocabulary: Vocabulary, fallback: F) -> Result<Self> {
        let extractor = FilterExtractor::new(vocabulary.synonyms, &vocabulary.intents);
        let matcher = IntentMatcher::new(vocabulary.intents)?;
        Ok(Self {
            matcher,
            extractor,
            fallback,
            executor: CommandExecutor::default(),
            sink: Arc::new(NullSink),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_executor(mut self, executor: CommandExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Model name written into usage records
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    /// Translate raw text into a command, without recording anything
    pub async fn translate(&self, raw: &str) -> Translation {
        let normalized = normalize(raw);
        tracing::debug!(raw, normalized = %normalized, "normalized request");

        let delegated_from = match self.matcher.find(&normalized) {
            Some(intent) => {
                let filters = self.extractor.extract(&normalized);
                tracing::debug!(intent = %intent.key, ?filters, "intent matched");
                match CommandBuilder::build(intent, &filters) {
                    Ok(generated) => {
                        tracing::info!(intent = %intent.key, command = %generated.command, "rule path");
                        return Translation {
                            normalized,
                            route: Route::Rule {
                                intent: intent.key.clone(),
                            },
                            outcome: ensure_executable(Ok(generated)),
                        };
                    }
                    Err(delegate) => Some(delegate.intent),
                }
            }
            None => None,
        };

        tracing::info!(delegated_from = ?delegated_from, "delegating to fallback");
        let outcome = ensure_executable(self.fallback.process(&normalized).await);
        if let Err(e) = &outcome {
            tracing::warn!(tag = e.kind.tag(), detail = ?e.detail, "fallback failed");
        }

        Translation {
            normalized,
            route: Route::Fallback {
                intent: delegated_from,
            },
            outcome,
        }
    }

    /// Validate, translate and record one boundary request
    pub async fn handle(&self, request: &CommandRequest) -> CommandResponse {
        if let Err(e) = request.validate() {
            return CommandResponse::failure(request.session_id, e.to_string());
        }

        let translation = self.translate(&request.raw_command).await;
        self.record_translation(request, &translation).await;
        CommandResponse::from_outcome(request.session_id, &translation.outcome)
    }

    /// Run a previously generated command and record the outcome
    ///
    /// Only prefixed, non-sentinel command lines are run.
    pub async fn execute(
        &self,
        command: &str,
        raw_command: &str,
        session_id: Option<Uuid>,
    ) -> Result<CommandExecutionResult> {
        if !is_executable_command(command) {
            return Err(AgentError::InvalidRequest(format!(
                "refusing to run non-kubectl command: {}",
                command
            )));
        }

        match self.executor.run(command).await {
            Ok(result) => {
                if !result.succeeded() {
                    tracing::warn!(command, exit_code = result.exit_code, "command exited non-zero");
                }
                let log = RequestLog::execution(raw_command, &result, session_id);
                self.report(move |sink| sink.append_request(&log)).await;
                Ok(result)
            }
            Err(e) => {
                let log = RequestLog::failure(raw_command, &e.to_string(), session_id);
                self.report(move |sink| sink.append_request(&log)).await;
                Err(e)
            }
        }
    }

    async fn record_translation(&self, request: &CommandRequest, translation: &Translation) {
        let log = match &translation.outcome {
            Ok(generated) => {
                RequestLog::success(&request.raw_command, &generated.command, request.session_id)
            }
            Err(e) => RequestLog::failure(&request.raw_command, &e.sentinel(), request.session_id),
        };
        let request_log_id = log.id;
        self.report(move |sink| sink.append_request(&log)).await;

        if let Some(usage) = translation.usage() {
            let usage_log = UsageLog::new(&self.model, usage, request.session_id, Some(request_log_id));
            self.report(move |sink| sink.append_usage(&usage_log)).await;
        }
    }

    // Sinks may block on I/O, so writes go to the blocking pool. A failing
    // sink never fails the request.
    async fn report<W>(&self, write: W)
    where
        W: FnOnce(&dyn RecordSink) -> Result<()> + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        match tokio::task::spawn_blocking(move || write(sink.as_ref())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to record outcome"),
            Err(e) => tracing::warn!(error = %e, "record writer did not complete"),
        }
    }
}

/// Anything labelled a command must be runnable
fn ensure_executable(
    outcome: std::result::Result<GeneratedCommand, FallbackError>,
) -> std::result::Result<GeneratedCommand, FallbackError> {
    match outcome {
        Ok(generated) if !is_executable_command(&generated.command) => {
            Err(FallbackError {
                usage: generated.usage,
                ..FallbackError::unable_to_generate()
            })
        }
        other => other,
    }
}
