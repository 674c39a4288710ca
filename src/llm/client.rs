//! Async client for the structured-generation service
//!
//! Speaks the OpenAI Responses API with a strict JSON schema output format.
//! The raw response is classified into completed / incomplete / refused so
//! callers never have to look at the wire format.

use crate::core::config::AgentConfig;
use crate::core::error::{AgentError, Result};
use crate::core::types::UsageInfo;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One structured-generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub instructions: String,
    pub input: String,
    pub max_output_tokens: u32,
    pub schema_name: String,
    /// JSON schema the output must satisfy
    pub schema: serde_json::Value,
}

/// How a call ended
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// Output text (the JSON document) of a finished call
    Completed(String),
    /// Output was cut short; `reason` is the provider's tag, e.g. `max_output_tokens`
    Incomplete { reason: String },
    /// The model declined; carries the refusal message
    Refused(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub outcome: GenerationOutcome,
    pub usage: Option<UsageInfo>,
}

/// Narrow capability the fallback depends on
///
/// `Err` means the call itself failed (transport, HTTP status, timeout).
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}

/// HTTP client for the Responses API
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl LlmClient {
    /// Create a new client; every call is bounded by `timeout`
    pub fn new(api_key: String, api_url: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::LlmError(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            api_url,
            model,
        })
    }

    /// Create a client from resolved configuration
    ///
    /// Fails when no API key is configured.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AgentError::LlmError("OPENAI_API_KEY not set".into()))?;
        Self::new(
            api_key,
            config.api_url.clone(),
            config.model.clone(),
            config.llm_timeout,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, request: &GenerationRequest) -> Result<ResponsesResponse> {
        let body = ResponsesRequest {
            model: &self.model,
            instructions: &request.instructions,
            input: &request.input,
            max_output_tokens: request.max_output_tokens,
            text: TextConfig {
                format: FormatConfig {
                    kind: "json_schema",
                    name: &request.schema_name,
                    schema: &request.schema,
                    strict: true,
                },
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::LlmError(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))
    }
}

#[async_trait]
impl StructuredGenerator for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        tracing::debug!(
            model = %self.model,
            max_output_tokens = request.max_output_tokens,
            "calling structured generation"
        );
        let response = self.post(request).await?;
        classify(response)
    }
}

/// Map a raw API response onto [`Generation`]
fn classify(response: ResponsesResponse) -> Result<Generation> {
    let usage = response.usage.as_ref().map(|u| {
        let cached = u
            .input_tokens_details
            .as_ref()
            .map(|d| d.cached_tokens)
            .unwrap_or(0);
        UsageInfo::new(u.input_tokens, u.output_tokens, cached)
    });

    if response.status.as_deref() == Some("incomplete") {
        let reason = response
            .incomplete_details
            .and_then(|d| d.reason)
            .unwrap_or_else(|| "unknown".into());
        return Ok(Generation {
            outcome: GenerationOutcome::Incomplete { reason },
            usage,
        });
    }

    let mut text = String::new();
    for part in response.output.iter().flat_map(|item| item.content.iter()) {
        match part {
            ContentPart::Refusal { refusal } => {
                return Ok(Generation {
                    outcome: GenerationOutcome::Refused(refusal.clone()),
                    usage,
                })
            }
            ContentPart::OutputText { text: chunk } => text.push_str(chunk),
            ContentPart::Other => {}
        }
    }

    if text.is_empty() {
        let detail = response
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "Empty response".into());
        return Err(AgentError::LlmError(detail));
    }

    Ok(Generation {
        outcome: GenerationOutcome::Completed(text),
        usage,
    })
}

// Responses API request
#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: &'a str,
    max_output_tokens: u32,
    text: TextConfig<'a>,
}

#[derive(Serialize)]
struct TextConfig<'a> {
    format: FormatConfig<'a>,
}

#[derive(Serialize)]
struct FormatConfig<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

// Responses API response
#[derive(Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    incomplete_details: Option<IncompleteDetails>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct IncompleteDetails {
    reason: Option<String>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(rename = "refusal")]
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
    #[serde(default)]
    input_tokens_details: Option<InputTokensDetails>,
}

#[derive(Deserialize)]
struct InputTokensDetails {
    #[serde(default)]
    cached_tokens: u64,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}
