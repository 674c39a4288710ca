//! Replaceable matching vocabulary: intent table and label synonyms
//!
//! The built-in tables cover the common Korean/English phrasings. A TOML
//! file with the same shape can replace them without touching the
//! pipeline.

use crate::command::intent::{builtin_intents, IntentDefinition};
use crate::core::error::{AgentError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Vocabulary {
    /// Intent rows in match priority order
    pub intents: Vec<IntentDefinition>,
    /// Natural-language noun -> canonical short form
    #[serde(default)]
    pub synonyms: HashMap<String, String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Vocabulary {
    pub fn builtin() -> Self {
        Self {
            intents: builtin_intents(),
            synonyms: builtin_synonyms(),
        }
    }

    /// Parse a vocabulary document
    ///
    /// Synonym keys are lowercased to line up with normalized text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut vocabulary: Vocabulary = toml::from_str(content)?;
        if vocabulary.intents.is_empty() {
            return Err(AgentError::Config("vocabulary defines no intents".into()));
        }
        vocabulary.synonyms = vocabulary
            .synonyms
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Ok(vocabulary)
    }

    /// Load from `path`, or the built-in tables when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    AgentError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                tracing::debug!(path = %path.display(), "loading vocabulary");
                Self::from_toml(&content)
            }
            None => Ok(Self::builtin()),
        }
    }
}

fn builtin_synonyms() -> HashMap<String, String> {
    [
        ("파드", "pod"),
        ("포드", "pod"),
        ("서비스", "svc"),
        ("로그", "log"),
        ("노드", "node"),
        ("디플로이먼트", "deploy"),
        ("노트", "note"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_intents_in_priority_order() {
        let vocabulary = Vocabulary::builtin();
        let keys: Vec<_> = vocabulary.intents.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["pod_list", "service_status", "pod_logs"]);
        assert_eq!(vocabulary.synonyms.get("파드").map(String::as_str), Some("pod"));
    }

    #[test]
    fn test_from_toml() {
        let vocabulary = Vocabulary::from_toml(
            r#"
            [[intents]]
            key = "node_list"
            template = "kubectl get nodes"
            keywords = ["노드 목록", "node list"]
            title = "List nodes"
            reason = "노드 목록 조회"

            [synonyms]
            "Worker" = "wk"
            "#,
        )
        .unwrap();

        assert_eq!(vocabulary.intents.len(), 1);
        assert_eq!(vocabulary.intents[0].keywords, vec!["노드 목록", "node list"]);
        assert_eq!(vocabulary.synonyms.get("worker").map(String::as_str), Some("wk"));
    }

    #[test]
    fn test_from_toml_rejects_empty_table() {
        assert!(Vocabulary::from_toml("intents = []").is_err());
    }

    #[test]
    fn test_load_without_path_is_builtin() {
        let vocabulary = Vocabulary::load(None).unwrap();
        assert_eq!(vocabulary.intents, builtin_intents());
    }
}
