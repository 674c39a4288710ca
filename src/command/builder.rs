//! Deterministic command synthesis from an intent and its filters

use crate::command::filters::FilterSet;
use crate::command::intent::{IntentDefinition, TARGET_PLACEHOLDER};
use crate::core::types::GeneratedCommand;

/// The intent needs a label the request did not contain; the request has
/// to go to the fallback instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateRequired {
    pub intent: String,
}

/// Assembles command lines from intent templates
pub struct CommandBuilder;

impl CommandBuilder {
    /// Render the command line for `intent`
    ///
    /// Order is fixed: template (with a positional label), then `-A` or
    /// `-n <ns>`, then the selector, then the intent's fixed flags, then
    /// `-c <container>` for log retrieval only.
    pub fn build_command(
        intent: &IntentDefinition,
        filters: &FilterSet,
    ) -> Result<String, DelegateRequired> {
        let label = filters.selector_label.as_deref();
        if label.is_none() && intent.requires_target() {
            return Err(DelegateRequired {
                intent: intent.key.clone(),
            });
        }

        let mut parts = vec![render_template(&intent.template, label)];

        if filters.scope_all {
            parts.push("-A".to_string());
        } else if let Some(ns) = &filters.namespace {
            parts.push(format!("-n {}", ns));
        }

        if let (Some(selector), Some(label)) = (&intent.selector, label) {
            parts.push(selector.replace(TARGET_PLACEHOLDER, label));
        }

        if let Some(flags) = &intent.flags {
            parts.push(flags.clone());
        }

        if is_log_retrieval(intent) {
            if let Some(container) = &filters.container {
                parts.push(format!("-c {}", container));
            }
        }

        Ok(parts.join(" "))
    }

    /// Render the command and attach the intent's title and reason
    pub fn build(
        intent: &IntentDefinition,
        filters: &FilterSet,
    ) -> Result<GeneratedCommand, DelegateRequired> {
        let command = Self::build_command(intent, filters)?;
        Ok(GeneratedCommand::new(
            command,
            describe(intent, filters),
            intent.title.clone(),
        ))
    }
}

fn is_log_retrieval(intent: &IntentDefinition) -> bool {
    intent.template.split_whitespace().nth(1) == Some("logs")
}

/// Substitute the label; drop bracketed segments when there is none
fn render_template(template: &str, target: Option<&str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut optional = String::new();
    let mut in_optional = false;

    for c in template.chars() {
        match c {
            '[' => in_optional = true,
            ']' => {
                if target.is_some() {
                    out.push_str(&optional);
                }
                optional.clear();
                in_optional = false;
            }
            _ if in_optional => optional.push(c),
            _ => out.push(c),
        }
    }

    let rendered = match target {
        Some(target) => out.replace(TARGET_PLACEHOLDER, target),
        None => out,
    };
    rendered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn describe(intent: &IntentDefinition, filters: &FilterSet) -> String {
    let mut details = Vec::new();
    if let Some(label) = &filters.selector_label {
        details.push(format!("app={}", label));
    }
    if filters.scope_all {
        details.push("all namespaces".to_string());
    } else if let Some(ns) = &filters.namespace {
        details.push(format!("namespace {}", ns));
    }
    if is_log_retrieval(intent) {
        if let Some(container) = &filters.container {
            details.push(format!("container {}", container));
        }
    }

    if details.is_empty() {
        intent.reason.clone()
    } else {
        format!("{} ({})", intent.reason, details.join(", "))
    }
}
