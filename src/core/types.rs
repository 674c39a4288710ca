//! Value types shared by every stage of the translation pipeline
//!
//! All of these are created and discarded within a single request.

use serde::{Deserialize, Serialize};

/// Every command this crate emits starts with this token.
pub const CLI_PREFIX: &str = "kubectl ";

/// Prefix shared by the non-executable sentinel strings (`kubectl # REFUSED: ...`).
pub const SENTINEL_PREFIX: &str = "kubectl # ";

/// True if `command` is a runnable invocation: prefixed, and not a sentinel.
pub fn is_executable_command(command: &str) -> bool {
    command.starts_with(CLI_PREFIX) && !command.starts_with(SENTINEL_PREFIX)
}

/// Token accounting reported by the structured-generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Subset of `input_tokens` served from the provider's prompt cache
    pub cached_tokens: u64,
}

impl UsageInfo {
    /// Build usage counters, clamping `cached_tokens` to `input_tokens`.
    pub fn new(input_tokens: u64, output_tokens: u64, cached_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cached_tokens: cached_tokens.min(input_tokens),
        }
    }
}

/// A finished command line plus the explanation shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCommand {
    pub command: String,
    pub reason: String,
    pub title: String,
    /// Present only when the structured-generation service was called
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
}

impl GeneratedCommand {
    pub fn new(command: impl Into<String>, reason: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            reason: reason.into(),
            title: title.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Option<UsageInfo>) -> Self {
        self.usage = usage;
        self
    }
}

/// Captured outcome of running a command line to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandExecutionResult {
    pub command: String,
    /// Process exit code, `-1` when the platform reported none (e.g. killed by signal)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}
