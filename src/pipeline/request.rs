//! Request/response shapes at the service boundary

use crate::core::error::{AgentError, Result};
use crate::core::types::GeneratedCommand;
use crate::llm::FallbackError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted request, in characters
pub const MAX_RAW_COMMAND_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub raw_command: String,
}

impl CommandRequest {
    pub fn new(raw_command: impl Into<String>) -> Self {
        Self {
            session_id: None,
            raw_command: raw_command.into(),
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.raw_command.trim().is_empty() {
            return Err(AgentError::InvalidRequest("raw_command must not be empty".into()));
        }
        let chars = self.raw_command.chars().count();
        if chars > MAX_RAW_COMMAND_CHARS {
            return Err(AgentError::InvalidRequest(format!(
                "raw_command is {} characters, limit is {}",
                chars, MAX_RAW_COMMAND_CHARS
            )));
        }
        Ok(())
    }
}

/// `success=true` carries command/reason/title, otherwise only `error_message`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub session_id: Option<Uuid>,
    pub success: bool,
    pub command: Option<String>,
    pub reason: Option<String>,
    pub title: Option<String>,
    pub error_message: Option<String>,
}

impl CommandResponse {
    pub fn success(session_id: Option<Uuid>, generated: &GeneratedCommand) -> Self {
        Self {
            session_id,
            success: true,
            command: Some(generated.command.clone()),
            reason: Some(generated.reason.clone()),
            title: Some(generated.title.clone()),
            error_message: None,
        }
    }

    pub fn failure(session_id: Option<Uuid>, error_message: impl Into<String>) -> Self {
        Self {
            session_id,
            success: false,
            command: None,
            reason: None,
            title: None,
            error_message: Some(error_message.into()),
        }
    }

    pub fn from_outcome(
        session_id: Option<Uuid>,
        outcome: &std::result::Result<GeneratedCommand, FallbackError>,
    ) -> Self {
        match outcome {
            Ok(generated) => Self::success(session_id, generated),
            Err(e) => Self::failure(session_id, e.sentinel()),
        }
    }
}
