//! Intent table and first-hit keyword matching

use crate::core::error::{AgentError, Result};
use crate::core::types::CLI_PREFIX;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder substituted with the canonical selector label
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// One row of the intent table
///
/// `template` is the base command line. It may carry the label positionally
/// through a `{target}` placeholder: inside a bracketed segment
/// (`kubectl get services[ {target}]`) it is rendered only when a label was
/// extracted, outside brackets it makes the label mandatory.
///
/// `selector` is the label flag (`-l app={target}`), placed after the scope
/// flag. `flags` are fixed modifiers placed after the selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub key: String,
    pub template: String,
    #[serde(default)]
    pub selector: Option<String>,
    /// The selector cannot be omitted; without a label the request is delegated
    #[serde(default)]
    pub selector_required: bool,
    #[serde(default)]
    pub flags: Option<String>,
    /// Substrings searched for in normalized text, any one is a hit
    pub keywords: Vec<String>,
    /// Short summary returned alongside the command
    pub title: String,
    /// Explanation returned alongside the command
    pub reason: String,
}

impl IntentDefinition {
    pub fn new(key: &str, template: &str, keywords: &[&str], title: &str, reason: &str) -> Self {
        Self {
            key: key.into(),
            template: template.into(),
            selector: None,
            selector_required: false,
            flags: None,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            title: title.into(),
            reason: reason.into(),
        }
    }

    /// Label flag rendered after the scope flag
    pub fn with_selector(mut self, selector: &str, required: bool) -> Self {
        self.selector = Some(selector.into());
        self.selector_required = required;
        self
    }

    pub fn with_flags(mut self, flags: &str) -> Self {
        self.flags = Some(flags.into());
        self
    }

    /// True if the command cannot be rendered without a label
    pub fn requires_target(&self) -> bool {
        (self.selector.is_some() && self.selector_required)
            || strip_optional_segments(&self.template).contains(TARGET_PLACEHOLDER)
    }

    fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(AgentError::Config("intent key must not be empty".into()));
        }
        if !self.template.starts_with(CLI_PREFIX) {
            return Err(AgentError::Config(format!(
                "template for intent '{}' must start with '{}'",
                self.key, CLI_PREFIX
            )));
        }
        if self.template.matches('[').count() != self.template.matches(']').count() {
            return Err(AgentError::Config(format!(
                "template for intent '{}' has unbalanced brackets",
                self.key
            )));
        }
        if let Some(selector) = &self.selector {
            if !selector.contains(TARGET_PLACEHOLDER) {
                return Err(AgentError::Config(format!(
                    "selector for intent '{}' must contain '{}'",
                    self.key, TARGET_PLACEHOLDER
                )));
            }
        }
        Ok(())
    }
}

fn strip_optional_segments(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut depth = 0usize;
    for c in template.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Built-in intent table, in match priority order
pub fn builtin_intents() -> Vec<IntentDefinition> {
    vec![
        IntentDefinition::new(
            "pod_list",
            "kubectl get pods",
            &["pod 목록", "파드 목록", "pod 리스트", "파드 리스트"],
            "List pods",
            "파드 목록 조회",
        )
        .with_selector("-l app={target}", false),
        IntentDefinition::new(
            "service_status",
            "kubectl get services[ {target}]",
            &["서비스 상태", "서비스 목록", "service 상태", "서비스 리스트"],
            "Service status",
            "서비스 상태 조회",
        ),
        IntentDefinition::new(
            "pod_logs",
            "kubectl logs",
            &["로그 조회", "log 확인", "로그 보기", "로그좀", "로그", "logs"],
            "Tail pod logs",
            "파드 로그 조회",
        )
        .with_selector("-l app={target}", true)
        .with_flags("-f --tail=10"),
    ]
}

/// Classifies normalized text into an intent
///
/// Keyword patterns are compiled once, one matcher per table row, and
/// consulted in table order. The first row with a hit wins.
#[derive(Debug, Clone)]
pub struct IntentMatcher {
    intents: Vec<IntentDefinition>,
    // Indexed like `intents`; `None` for rows without keywords
    patterns: Vec<Option<Regex>>,
}

impl IntentMatcher {
    pub fn new(intents: Vec<IntentDefinition>) -> Result<Self> {
        let mut patterns = Vec::with_capacity(intents.len());
        for intent in &intents {
            intent.validate()?;
            patterns.push(compile_keywords(&intent.keywords)?);
        }
        Ok(Self { intents, patterns })
    }

    pub fn builtin() -> Result<Self> {
        Self::new(builtin_intents())
    }

    /// First intent whose keywords occur anywhere in `text`
    pub fn find(&self, text: &str) -> Option<&IntentDefinition> {
        self.patterns
            .iter()
            .position(|pattern| pattern.as_ref().is_some_and(|re| re.is_match(text)))
            .map(|idx| &self.intents[idx])
    }

    /// Key of the first matching intent; `None` is the signal to delegate
    pub fn match_key(&self, text: &str) -> Option<&str> {
        self.find(text).map(|intent| intent.key.as_str())
    }
}

fn keyword_alternation(keywords: &[String]) -> String {
    keywords
        .iter()
        .filter(|kw| !kw.is_empty())
        .map(|kw| regex::escape(kw))
        .collect::<Vec<_>>()
        .join("|")
}

fn compile_keywords(keywords: &[String]) -> Result<Option<Regex>> {
    let alternation = keyword_alternation(keywords);
    if alternation.is_empty() {
        return Ok(None);
    }
    Regex::new(&alternation)
        .map(Some)
        .map_err(|e| AgentError::Config(format!("invalid keyword pattern: {}", e)))
}
