//! Fallback translation through the structured-generation service
//!
//! Used only when the rule path cannot produce a command. The adapter never
//! fails past its own boundary: callers get either a [`GeneratedCommand`]
//! or a tagged [`FallbackError`].

use crate::core::types::{GeneratedCommand, UsageInfo, CLI_PREFIX, SENTINEL_PREFIX};
use crate::llm::client::{Generation, GenerationOutcome, GenerationRequest, StructuredGenerator};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Incompleteness reason that earns one retry with a doubled budget
pub const OUTPUT_LIMIT_REASON: &str = "max_output_tokens";

/// Failure tags, kept stable for downstream reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackErrorKind {
    UnableToGenerate,
    Refused,
    Incomplete,
    LlmCallFailed,
    JsonParseFailed,
}

impl FallbackErrorKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::UnableToGenerate => "UNABLE_TO_GENERATE",
            Self::Refused => "REFUSED",
            Self::Incomplete => "INCOMPLETE",
            Self::LlmCallFailed => "LLM_CALL_FAILED",
            Self::JsonParseFailed => "JSON_PARSE_FAILED",
        }
    }
}

impl fmt::Display for FallbackErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Why the fallback produced no command
///
/// Displays as the legacy sentinel line, e.g. `kubectl # REFUSED: <detail>`.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackError {
    pub kind: FallbackErrorKind,
    pub detail: Option<String>,
    /// Tokens spent before the failure, when the service reported them
    pub usage: Option<UsageInfo>,
}

impl FallbackError {
    pub fn new(kind: FallbackErrorKind) -> Self {
        Self {
            kind,
            detail: None,
            usage: None,
        }
    }

    pub fn with_detail(kind: FallbackErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
            usage: None,
        }
    }

    pub fn unable_to_generate() -> Self {
        Self::new(FallbackErrorKind::UnableToGenerate)
    }

    fn with_usage(mut self, usage: Option<UsageInfo>) -> Self {
        self.usage = usage;
        self
    }

    /// `kubectl # <TAG>` or `kubectl # <TAG>: <detail>`
    pub fn sentinel(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}{}: {}", SENTINEL_PREFIX, self.kind.tag(), detail),
            None => format!("{}{}", SENTINEL_PREFIX, self.kind.tag()),
        }
    }
}

impl fmt::Display for FallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sentinel())
    }
}

impl std::error::Error for FallbackError {}

/// Boundary to whatever turns unmatched text into a command
#[async_trait]
pub trait FallbackAdapter: Send + Sync {
    async fn process(&self, text: &str) -> Result<GeneratedCommand, FallbackError>;
}

#[async_trait]
impl<T: FallbackAdapter + ?Sized> FallbackAdapter for Box<T> {
    async fn process(&self, text: &str) -> Result<GeneratedCommand, FallbackError> {
        (**self).process(text).await
    }
}

/// Fallback used when no API key is configured
pub struct DisabledFallback;

#[async_trait]
impl FallbackAdapter for DisabledFallback {
    async fn process(&self, _text: &str) -> Result<GeneratedCommand, FallbackError> {
        Err(FallbackError::with_detail(
            FallbackErrorKind::LlmCallFailed,
            "structured generation is not configured (OPENAI_API_KEY not set)",
        ))
    }
}

/// Fallback backed by a [`StructuredGenerator`]
pub struct LlmFallback<G> {
    generator: G,
    max_output_tokens: u32,
    call_timeout: Duration,
}

#[derive(Deserialize)]
struct CommandPayload {
    command: String,
    reason: String,
    title: String,
}

impl<G: StructuredGenerator> LlmFallback<G> {
    pub fn new(generator: G, max_output_tokens: u32, call_timeout: Duration) -> Self {
        Self {
            generator,
            max_output_tokens,
            call_timeout,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    async fn call(
        &self,
        request: &GenerationRequest,
    ) -> Result<Generation, FallbackError> {
        match tokio::time::timeout(self.call_timeout, self.generator.generate(request)).await {
            Ok(Ok(generation)) => Ok(generation),
            Ok(Err(e)) => Err(FallbackError::with_detail(
                FallbackErrorKind::LlmCallFailed,
                e.to_string(),
            )),
            Err(_) => Err(FallbackError::with_detail(
                FallbackErrorKind::LlmCallFailed,
                format!("timed out after {:?}", self.call_timeout),
            )),
        }
    }
}

#[async_trait]
impl<G: StructuredGenerator> FallbackAdapter for LlmFallback<G> {
    async fn process(&self, text: &str) -> Result<GeneratedCommand, FallbackError> {
        let mut request = build_request(text, self.max_output_tokens);
        let mut generation = self.call(&request).await?;

        if matches!(&generation.outcome, GenerationOutcome::Incomplete { reason } if reason == OUTPUT_LIMIT_REASON)
        {
            request.max_output_tokens = request.max_output_tokens.saturating_mul(2);
            tracing::info!(
                max_output_tokens = request.max_output_tokens,
                "output truncated, retrying once with a larger budget"
            );
            let truncated_usage = generation.usage;
            generation = self
                .call(&request)
                .await
                .map_err(|e| e.with_usage(truncated_usage))?;
        }

        let usage = generation.usage;
        let raw = match generation.outcome {
            GenerationOutcome::Completed(raw) => raw,
            GenerationOutcome::Incomplete { reason } => {
                return Err(
                    FallbackError::with_detail(FallbackErrorKind::Incomplete, reason).with_usage(usage),
                )
            }
            GenerationOutcome::Refused(detail) => {
                return Err(
                    FallbackError::with_detail(FallbackErrorKind::Refused, detail).with_usage(usage),
                )
            }
        };

        let payload: CommandPayload = serde_json::from_str(&raw).map_err(|e| {
            FallbackError::with_detail(FallbackErrorKind::JsonParseFailed, e.to_string())
                .with_usage(usage)
        })?;

        let command = extract_command(&payload.command)
            .filter(|c| !c.starts_with(SENTINEL_PREFIX))
            .ok_or_else(|| FallbackError::unable_to_generate().with_usage(usage))?;

        Ok(GeneratedCommand {
            command,
            reason: payload.reason,
            title: payload.title,
            usage,
        })
    }
}

/// Pull the command line out of model output
///
/// Drops code fences and returns the first line starting with the CLI
/// prefix, or `None` if there is no such line.
pub fn extract_command(raw: &str) -> Option<String> {
    let mut text = raw.trim();

    if text.contains("```") {
        if let Some(fenced) = text.split("```").nth(1) {
            text = fenced.trim();
        }
    }

    text.lines()
        .map(str::trim)
        .find(|line| line.starts_with(CLI_PREFIX))
        .map(str::to_string)
}

fn build_request(text: &str, max_output_tokens: u32) -> GenerationRequest {
    GenerationRequest {
        instructions: SYSTEM_PROMPT.to_string(),
        input: format!(
            "다음 요청을 하나의 kubectl 명령어로 변환해 주세요.\n요청: {}",
            text
        ),
        max_output_tokens,
        schema_name: "kubectl_command".to_string(),
        schema: command_schema(),
    }
}

fn command_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "command": {
                "type": "string",
                "description": "Exactly one kubectl command line"
            },
            "reason": {
                "type": "string",
                "description": "Why this command answers the request, in the user's language"
            },
            "title": {
                "type": "string",
                "description": "Short title for the command"
            }
        },
        "required": ["command", "reason", "title"],
        "additionalProperties": false
    })
}

/// Instructions for command generation
const SYSTEM_PROMPT: &str = r#"You are an expert Kubernetes operator and kubectl CLI generator.
The user will give you a request in Korean (sometimes mixed with English).
Convert the request into EXACTLY ONE kubectl command line.

Requirements:
- "command" holds only the kubectl command: no explanation, no comments, no quotes, no code fences.
- Prefer safe, read-only operations when ambiguous (e.g. 'kubectl get ...').
- If a namespace is clearly mentioned, add '-n <namespace>'.
- If the user mentions '모든 네임스페이스' or '전체 네임스페이스', use '-A'.
- If the user refers to an app/service name, use label selectors when appropriate (e.g. '-l app=<name>').
- "reason" briefly explains the command; "title" is a short summary.
- If you truly cannot generate a kubectl command, set "command" to exactly: 'kubectl # UNABLE_TO_GENERATE'.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{AgentError, Result};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned generations and records the budgets it was asked for
    struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<Generation>>>,
        budgets: Mutex<Vec<u32>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<Generation>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                budgets: Mutex::new(Vec::new()),
            }
        }

        fn budgets(&self) -> Vec<u32> {
            self.budgets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StructuredGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
            self.budgets.lock().unwrap().push(request.max_output_tokens);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::LlmError("script exhausted".into())))
        }
    }

    fn completed(json: &str, usage: UsageInfo) -> Result<Generation> {
        Ok(Generation {
            outcome: GenerationOutcome::Completed(json.into()),
            usage: Some(usage),
        })
    }

    fn incomplete(reason: &str, usage: UsageInfo) -> Result<Generation> {
        Ok(Generation {
            outcome: GenerationOutcome::Incomplete {
                reason: reason.into(),
            },
            usage: Some(usage),
        })
    }

    fn fallback(replies: Vec<Result<Generation>>) -> LlmFallback<ScriptedGenerator> {
        LlmFallback::new(ScriptedGenerator::new(replies), 256, Duration::from_secs(5))
    }

    const GOOD: &str =
        r#"{"command": "kubectl rollout restart deployment/api", "reason": "재시작", "title": "Restart api"}"#;

    #[tokio::test]
    async fn test_completed_generation() {
        let adapter = fallback(vec![completed(GOOD, UsageInfo::new(100, 20, 0))]);
        let generated = adapter.process("api 재시작").await.unwrap();

        assert_eq!(generated.command, "kubectl rollout restart deployment/api");
        assert_eq!(generated.title, "Restart api");
        assert_eq!(generated.usage, Some(UsageInfo::new(100, 20, 0)));
        assert_eq!(adapter.generator().budgets(), vec![256]);
    }

    #[tokio::test]
    async fn test_output_limit_retries_once_with_doubled_budget() {
        let adapter = fallback(vec![
            incomplete(OUTPUT_LIMIT_REASON, UsageInfo::new(100, 256, 0)),
            completed(GOOD, UsageInfo::new(100, 300, 50)),
        ]);
        let generated = adapter.process("api 재시작").await.unwrap();

        assert_eq!(adapter.generator().budgets(), vec![256, 512]);
        // Usage comes from the retried call
        assert_eq!(generated.usage, Some(UsageInfo::new(100, 300, 50)));
    }

    #[tokio::test]
    async fn test_second_truncation_is_surfaced() {
        let adapter = fallback(vec![
            incomplete(OUTPUT_LIMIT_REASON, UsageInfo::new(1, 256, 0)),
            incomplete(OUTPUT_LIMIT_REASON, UsageInfo::new(1, 512, 0)),
            completed(GOOD, UsageInfo::default()),
        ]);
        let err = adapter.process("x").await.unwrap_err();

        assert_eq!(err.kind, FallbackErrorKind::Incomplete);
        assert_eq!(err.sentinel(), "kubectl # INCOMPLETE: max_output_tokens");
        assert_eq!(err.usage, Some(UsageInfo::new(1, 512, 0)));
        assert_eq!(adapter.generator().budgets(), vec![256, 512]);
    }

    #[tokio::test]
    async fn test_failed_retry_keeps_truncated_usage() {
        let adapter = fallback(vec![
            incomplete(OUTPUT_LIMIT_REASON, UsageInfo::new(100, 256, 20)),
            Err(AgentError::LlmError("connection reset".into())),
        ]);
        let err = adapter.process("x").await.unwrap_err();

        assert_eq!(err.kind, FallbackErrorKind::LlmCallFailed);
        assert_eq!(err.usage, Some(UsageInfo::new(100, 256, 20)));
        assert_eq!(adapter.generator().budgets(), vec![256, 512]);
    }

    #[tokio::test]
    async fn test_other_incomplete_reason_is_not_retried() {
        let adapter = fallback(vec![incomplete("content_filter", UsageInfo::default())]);
        let err = adapter.process("x").await.unwrap_err();

        assert_eq!(err.to_string(), "kubectl # INCOMPLETE: content_filter");
        assert_eq!(adapter.generator().budgets(), vec![256]);
    }

    #[tokio::test]
    async fn test_refusal() {
        let adapter = fallback(vec![Ok(Generation {
            outcome: GenerationOutcome::Refused("no".into()),
            usage: None,
        })]);
        let err = adapter.process("delete everything").await.unwrap_err();

        assert_eq!(err.kind, FallbackErrorKind::Refused);
        assert_eq!(err.to_string(), "kubectl # REFUSED: no");
    }

    #[tokio::test]
    async fn test_call_failure() {
        let adapter = fallback(vec![Err(AgentError::LlmError("connection reset".into()))]);
        let err = adapter.process("x").await.unwrap_err();

        assert_eq!(err.kind, FallbackErrorKind::LlmCallFailed);
        assert!(err.sentinel().starts_with("kubectl # LLM_CALL_FAILED: "));
        assert!(err.sentinel().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_bad_json() {
        let adapter = fallback(vec![completed(r#"{"command": "kubectl get pods"}"#, UsageInfo::default())]);
        let err = adapter.process("x").await.unwrap_err();
        assert_eq!(err.kind, FallbackErrorKind::JsonParseFailed);
    }

    #[tokio::test]
    async fn test_missing_prefix_is_unable_to_generate() {
        let adapter = fallback(vec![completed(
            r#"{"command": "helm list", "reason": "r", "title": "t"}"#,
            UsageInfo::default(),
        )]);
        let err = adapter.process("x").await.unwrap_err();
        assert_eq!(err.sentinel(), "kubectl # UNABLE_TO_GENERATE");
    }

    #[tokio::test]
    async fn test_model_sentinel_is_unable_to_generate() {
        let adapter = fallback(vec![completed(
            r#"{"command": "kubectl # UNABLE_TO_GENERATE", "reason": "r", "title": "t"}"#,
            UsageInfo::default(),
        )]);
        let err = adapter.process("x").await.unwrap_err();
        assert_eq!(err.kind, FallbackErrorKind::UnableToGenerate);
    }

    #[tokio::test]
    async fn test_fenced_command_is_cleaned() {
        let adapter = fallback(vec![completed(
            r#"{"command": "```bash\nkubectl get nodes -o wide\n```", "reason": "r", "title": "t"}"#,
            UsageInfo::default(),
        )]);
        let generated = adapter.process("노드 상세").await.unwrap();
        assert_eq!(generated.command, "kubectl get nodes -o wide");
    }

    #[tokio::test]
    async fn test_disabled_fallback() {
        let err = DisabledFallback.process("x").await.unwrap_err();
        assert_eq!(err.kind, FallbackErrorKind::LlmCallFailed);
    }

    #[test]
    fn test_extract_command() {
        assert_eq!(extract_command("kubectl get pods").as_deref(), Some("kubectl get pods"));
        assert_eq!(
            extract_command("Here you go:\n  kubectl get svc -A  \nkubectl get pods").as_deref(),
            Some("kubectl get svc -A")
        );
        assert_eq!(extract_command("```kubectl get pods```").as_deref(), Some("kubectl get pods"));
        assert_eq!(extract_command("get pods"), None);
        assert_eq!(extract_command(""), None);
    }

    #[test]
    fn test_sentinel_tags() {
        let tags: Vec<_> = [
            FallbackErrorKind::UnableToGenerate,
            FallbackErrorKind::Refused,
            FallbackErrorKind::Incomplete,
            FallbackErrorKind::LlmCallFailed,
            FallbackErrorKind::JsonParseFailed,
        ]
        .iter()
        .map(|k| FallbackError::new(*k).sentinel())
        .collect();

        assert_eq!(
            tags,
            vec![
                "kubectl # UNABLE_TO_GENERATE",
                "kubectl # REFUSED",
                "kubectl # INCOMPLETE",
                "kubectl # LLM_CALL_FAILED",
                "kubectl # JSON_PARSE_FAILED",
            ]
        );
    }

    #[test]
    fn test_request_shape() {
        let request = build_request("노드 목록", 128);
        assert!(request.input.ends_with("요청: 노드 목록"));
        assert_eq!(request.schema["required"], serde_json::json!(["command", "reason", "title"]));
        assert_eq!(request.max_output_tokens, 128);
    }
}
