//! Persisted record shapes
//!
//! Field names match the request/usage log tables of the web service so the
//! JSON lines can be imported as-is.

use crate::core::types::{CommandExecutionResult, UsageInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One translation or execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: Uuid,
    pub raw_command: String,
    pub is_success: bool,
    pub requested_at: DateTime<Utc>,
    pub executed_command: Option<String>,
    pub error_message: Option<String>,
    pub session_id: Option<Uuid>,
}

impl RequestLog {
    pub fn success(raw_command: &str, command: &str, session_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_command: raw_command.to_string(),
            is_success: true,
            requested_at: Utc::now(),
            executed_command: Some(command.to_string()),
            error_message: None,
            session_id,
        }
    }

    pub fn failure(raw_command: &str, error_message: &str, session_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_command: raw_command.to_string(),
            is_success: false,
            requested_at: Utc::now(),
            executed_command: None,
            error_message: Some(error_message.to_string()),
            session_id,
        }
    }

    /// Record of a finished execution; success means exit code 0
    pub fn execution(
        raw_command: &str,
        result: &CommandExecutionResult,
        session_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_command: raw_command.to_string(),
            is_success: result.succeeded(),
            requested_at: Utc::now(),
            executed_command: Some(result.command.clone()),
            error_message: (!result.stderr.is_empty()).then(|| result.stderr.clone()),
            session_id,
        }
    }
}

/// Tokens spent on one structured-generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLog {
    pub id: Uuid,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    pub created_at: DateTime<Utc>,
    pub session_id: Option<Uuid>,
    pub request_log_id: Option<Uuid>,
}

impl UsageLog {
    pub fn new(
        model: &str,
        usage: UsageInfo,
        session_id: Option<Uuid>,
        request_log_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: model.to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cached_tokens: usage.cached_tokens,
            created_at: Utc::now(),
            session_id,
            request_log_id,
        }
    }

    pub fn usage(&self) -> UsageInfo {
        UsageInfo::new(self.input_tokens, self.output_tokens, self.cached_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_record() {
        let result = CommandExecutionResult {
            command: "kubectl get pods".into(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "connection refused".into(),
        };
        let log = RequestLog::execution("파드 목록", &result, None);
        assert!(!log.is_success);
        assert_eq!(log.executed_command.as_deref(), Some("kubectl get pods"));
        assert_eq!(log.error_message.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_clean_execution_has_no_error_message() {
        let result = CommandExecutionResult {
            command: "kubectl get pods".into(),
            exit_code: 0,
            stdout: "NAME READY".into(),
            stderr: String::new(),
        };
        let log = RequestLog::execution("파드 목록", &result, None);
        assert!(log.is_success);
        assert!(log.error_message.is_none());
    }

    #[test]
    fn test_usage_log_roundtrips_counters() {
        let session = Uuid::new_v4();
        let log = UsageLog::new("gpt-5-mini", UsageInfo::new(10, 5, 2), Some(session), None);
        assert_eq!(log.usage(), UsageInfo::new(10, 5, 2));
        assert_eq!(log.session_id, Some(session));
    }
}
