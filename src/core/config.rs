//! Runtime configuration
//!
//! Values are resolved once at startup (defaults, then the TOML file, then
//! environment overrides) and handed to components as plain fields.

use crate::core::error::{AgentError, Result};
use crate::usage::PricingTable;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default endpoint of the structured-generation service
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/responses";
/// Default model identifier
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

/// Configuration for the translation pipeline and its collaborators
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// API key for the structured-generation service
    ///
    /// `None` disables the fallback path; unmatched requests then fail
    /// with `LLM_CALL_FAILED`.
    pub api_key: Option<String>,

    pub api_url: String,

    pub model: String,

    /// Upper bound for a single call to the generation service
    pub llm_timeout: Duration,

    /// Output-token budget of the first generation attempt
    ///
    /// A retry after a truncated answer doubles this once.
    pub max_output_tokens: u32,

    /// Upper bound for a subprocess run by the executor
    pub exec_timeout: Duration,

    /// Directory holding `request_logs.jsonl` and `usage_logs.jsonl`
    pub data_dir: PathBuf,

    /// Optional TOML file replacing the built-in intent table and synonyms
    pub vocabulary_path: Option<PathBuf>,

    /// Per-model token prices used by the usage report
    pub pricing: PricingTable,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.into(),
            model: DEFAULT_MODEL.into(),
            llm_timeout: Duration::from_secs(60),
            max_output_tokens: 1024,
            exec_timeout: Duration::from_secs(30),
            data_dir: aklp_home().join("data"),
            vocabulary_path: None,
            pricing: PricingTable::default(),
        }
    }
}

// On-disk layout of ~/.aklp/config.toml
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    openai: OpenAiSection,
    #[serde(default)]
    executor: ExecutorSection,
    #[serde(default)]
    storage: StorageSection,
    #[serde(default)]
    rules: RulesSection,
    #[serde(default)]
    pricing: Option<PricingTable>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiSection {
    api_key: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecutorSection {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RulesSection {
    vocabulary: Option<PathBuf>,
}

impl AgentConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve configuration from file and process environment
    ///
    /// With `path = None` the shared `~/.aklp/config.toml` is read if it
    /// exists. An explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (aklp_home().join("config.toml"), false),
        };

        if required || file.exists() {
            let content = std::fs::read_to_string(&file).map_err(|e| {
                AgentError::Config(format!("Failed to read {}: {}", file.display(), e))
            })?;
            config.apply_toml(&content)?;
        }

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a TOML document
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let file: ConfigFile = toml::from_str(content)?;

        if let Some(key) = file.openai.api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = file.openai.api_url {
            self.api_url = url;
        }
        if let Some(model) = file.openai.model {
            self.model = model;
        }
        if let Some(secs) = file.openai.timeout_secs {
            self.llm_timeout = Duration::from_secs(secs);
        }
        if let Some(tokens) = file.openai.max_output_tokens {
            self.max_output_tokens = tokens;
        }
        if let Some(secs) = file.executor.timeout_secs {
            self.exec_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = file.storage.data_dir {
            self.data_dir = dir;
        }
        if let Some(vocabulary) = file.rules.vocabulary {
            self.vocabulary_path = Some(vocabulary);
        }
        if let Some(pricing) = file.pricing {
            self.pricing = pricing;
        }
        Ok(())
    }

    /// Overlay environment variables
    ///
    /// `OPENAI_API_KEY` only fills in a key the config file did not supply.
    /// Unparseable numeric values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("OPENAI_API_URL") {
            self.api_url = url;
        }
        if let Some(secs) = lookup("OPENAI_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.llm_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = lookup("EXEC_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.exec_timeout = Duration::from_secs(secs);
        }
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.llm_timeout.is_zero() {
            return Err(AgentError::Config("LLM timeout must be positive".into()));
        }
        if self.exec_timeout.is_zero() {
            return Err(AgentError::Config("execution timeout must be positive".into()));
        }
        if self.max_output_tokens == 0 {
            return Err(AgentError::Config("max_output_tokens must be positive".into()));
        }
        if self.model.trim().is_empty() {
            return Err(AgentError::Config("model must not be empty".into()));
        }
        self.pricing.validate().map_err(AgentError::Config)?;
        Ok(())
    }
}

/// `~/.aklp`, shared with the other tools of the same suite
fn aklp_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".aklp")
}
