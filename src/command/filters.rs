//! Filter extraction: scope, namespace, selector label and container
//!
//! Values are read from the token next to a marker word. Korean places the
//! name before the noun ("kube-system 네임스페이스", "api 앱"), English after
//! it ("namespace kube-system", "-c nginx"), so each marker looks on its
//! natural side first and falls back to the other side.

use crate::command::intent::IntentDefinition;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Structured modifiers pulled out of a request
///
/// `scope_all` and `namespace` are never both set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub scope_all: bool,
    pub namespace: Option<String>,
    /// Canonicalized app label
    pub selector_label: Option<String>,
    pub container: Option<String>,
}

struct MarkerSet {
    korean: &'static [&'static str],
    latin: &'static [&'static str],
}

const NAMESPACE_MARKERS: MarkerSet = MarkerSet {
    korean: &["네임스페이스"],
    latin: &["namespace", "ns", "nm", "-n"],
};

const LABEL_MARKERS: MarkerSet = MarkerSet {
    korean: &["앱", "서비스", "이름"],
    latin: &["app", "service", "name", "-l"],
};

const CONTAINER_MARKERS: MarkerSet = MarkerSet {
    korean: &["컨테이너"],
    latin: &["container", "-c"],
};

const SCOPE_WORDS: &[&str] = &["모든", "전체", "all", "-a", "--all-namespaces"];

/// Particles that may be glued onto a Korean word ("네임스페이스의")
const ATTACHED_PARTICLES: &[&str] = &[
    "에서", "으로", "의", "에", "을", "를", "은", "는", "이", "가", "로",
];

fn scope_all_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?:^|\s)(?:모든|전체|all)\s*(?:네임스페이스\S*|namespaces?|ns)(?:\s|$)|(?:^|\s)(?:-a|--all-namespaces)(?:\s|$)",
        )
        .expect("valid scope-all regex")
    })
}

#[derive(Clone, Copy)]
enum Side {
    Before,
    After,
}

/// Extracts a [`FilterSet`] from normalized text. Total; never fails.
#[derive(Debug, Clone)]
pub struct FilterExtractor {
    synonyms: HashMap<String, String>,
    // Markers and scope words; never a filter value
    markers: HashSet<String>,
    // Intent keyword tokens; a label only when they have a synonym entry
    keyword_tokens: HashSet<String>,
}

impl FilterExtractor {
    /// Build an extractor that skips the tokens of intent keywords, so
    /// "서비스 상태" never yields the label "상태". Keyword nouns listed in the
    /// synonym table ("서비스 파드 로그 조회") still count as labels.
    pub fn new(synonyms: HashMap<String, String>, intents: &[IntentDefinition]) -> Self {
        let mut markers: HashSet<String> = SCOPE_WORDS.iter().map(|w| w.to_string()).collect();
        for set in [&NAMESPACE_MARKERS, &LABEL_MARKERS, &CONTAINER_MARKERS] {
            markers.extend(set.korean.iter().map(|w| w.to_string()));
            markers.extend(set.latin.iter().map(|w| w.to_string()));
        }
        let keyword_tokens = intents
            .iter()
            .flat_map(|intent| intent.keywords.iter())
            .flat_map(|keyword| keyword.split_whitespace().map(str::to_lowercase))
            .collect();
        Self {
            synonyms,
            markers,
            keyword_tokens,
        }
    }

    pub fn extract(&self, text: &str) -> FilterSet {
        let tokens: Vec<&str> = text.split_whitespace().collect();

        let scope_all = scope_all_pattern().is_match(text);
        let namespace = if scope_all {
            None
        } else {
            self.value_near(&tokens, &NAMESPACE_MARKERS, false)
        };

        let selector_label = self
            .value_near(&tokens, &LABEL_MARKERS, true)
            .map(|label| self.canonicalize(&label));

        let container = self.value_near(&tokens, &CONTAINER_MARKERS, false);

        FilterSet {
            scope_all,
            namespace,
            selector_label,
            container,
        }
    }

    /// Synonym lookup, identity when absent
    pub fn canonicalize(&self, value: &str) -> String {
        self.synonyms
            .get(value)
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }

    fn value_near(&self, tokens: &[&str], markers: &MarkerSet, canonical: bool) -> Option<String> {
        tokens.iter().enumerate().find_map(|(idx, token)| {
            let sides: [Side; 2] = if is_marker(token, markers.korean, true) {
                [Side::Before, Side::After]
            } else if is_marker(token, markers.latin, false) {
                [Side::After, Side::Before]
            } else {
                return None;
            };

            sides.iter().find_map(|side| {
                let neighbour = match side {
                    Side::Before => idx.checked_sub(1).map(|i| tokens[i]),
                    Side::After => tokens.get(idx + 1).copied(),
                }?;
                self.as_value(neighbour, canonical)
            })
        })
    }

    fn as_value(&self, token: &str, canonical: bool) -> Option<String> {
        let value = strip_glued_particle(token);
        let keyword = self.keyword_tokens.contains(value)
            && !(canonical && self.synonyms.contains_key(value));
        let valid = !value.is_empty()
            && !value.starts_with('-')
            && value.chars().all(is_value_char)
            && !self.markers.contains(value)
            && !keyword;
        valid.then(|| value.to_string())
    }
}

fn is_marker(token: &str, markers: &[&str], allow_particle: bool) -> bool {
    if markers.contains(&token) {
        return true;
    }
    allow_particle
        && ATTACHED_PARTICLES
            .iter()
            .filter_map(|p| token.strip_suffix(p))
            .any(|stem| markers.contains(&stem))
}

/// "default에서" -> "default". Korean stems are left alone since their last
/// syllable often looks like a particle.
fn strip_glued_particle(token: &str) -> &str {
    ATTACHED_PARTICLES
        .iter()
        .filter_map(|p| token.strip_suffix(p))
        .find(|stem| stem.chars().last().is_some_and(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(token)
}

fn is_value_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || matches!(c, '-' | '_' | '.')
        || ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::vocabulary::Vocabulary;
    use proptest::prelude::*;

    fn extractor() -> FilterExtractor {
        let vocabulary = Vocabulary::builtin();
        FilterExtractor::new(vocabulary.synonyms, &vocabulary.intents)
    }

    #[test]
    fn test_scope_all_suppresses_namespace() {
        let filters = extractor().extract("모든 네임스페이스의 파드 목록");
        assert!(filters.scope_all);
        assert_eq!(filters.namespace, None);
    }

    #[test]
    fn test_namespace_before_korean_marker() {
        let filters = extractor().extract("kube-system 네임스페이스 파드 목록");
        assert!(!filters.scope_all);
        assert_eq!(filters.namespace.as_deref(), Some("kube-system"));
    }

    #[test]
    fn test_namespace_after_latin_marker() {
        let filters = extractor().extract("ns monitoring 파드 목록");
        assert_eq!(filters.namespace.as_deref(), Some("monitoring"));

        let filters = extractor().extract("파드 목록 -n default");
        assert_eq!(filters.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_korean_marker_falls_back_to_following_token() {
        let filters = extractor().extract("파드 목록 네임스페이스 default");
        assert_eq!(filters.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_label_skips_reserved_neighbour() {
        let filters = extractor().extract("api 서비스 상태");
        assert_eq!(filters.selector_label.as_deref(), Some("api"));

        let filters = extractor().extract("서비스 목록");
        assert_eq!(filters.selector_label, None);
    }

    #[test]
    fn test_label_is_canonicalized() {
        let filters = extractor().extract("노트 서비스 pod 목록");
        assert_eq!(filters.selector_label.as_deref(), Some("note"));

        let filters = extractor().extract("payments 앱 파드 목록");
        assert_eq!(filters.selector_label.as_deref(), Some("payments"));
    }

    #[test]
    fn test_container_extraction() {
        let filters = extractor().extract("api 앱 로그 컨테이너 nginx");
        assert_eq!(filters.selector_label.as_deref(), Some("api"));
        assert_eq!(filters.container.as_deref(), Some("nginx"));
    }

    #[test]
    fn test_glued_particles() {
        let filters = extractor().extract("default에서 네임스페이스의 파드 목록");
        assert_eq!(filters.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_label_and_container_run_regardless_of_scope() {
        let filters = extractor().extract("전체 네임스페이스 web 앱 로그 container sidecar");
        assert!(filters.scope_all);
        assert_eq!(filters.namespace, None);
        assert_eq!(filters.selector_label.as_deref(), Some("web"));
        assert_eq!(filters.container.as_deref(), Some("sidecar"));
    }

    #[test]
    fn test_word_ending_in_all_is_not_scope() {
        let filters = extractor().extract("app firewall ns prod 파드 목록");
        assert!(!filters.scope_all);
        assert_eq!(filters.namespace.as_deref(), Some("prod"));
        assert_eq!(filters.selector_label.as_deref(), Some("firewall"));

        let filters = extractor().extract("install namespaces 파드 목록");
        assert!(!filters.scope_all);
    }

    #[test]
    fn test_scope_all_variants() {
        for text in ["all ns 파드 목록", "전체네임스페이스 파드 목록", "파드 목록 --all-namespaces", "파드 목록 -a"] {
            assert!(extractor().extract(text).scope_all, "{}", text);
        }
    }

    #[test]
    fn test_keyword_nouns_canonicalize_through_synonyms() {
        let cases = [
            ("서비스 로그 보기", "log"),
            ("앱 파드 로그 보기", "pod"),
            ("파드 앱 로그 보기", "pod"),
            ("서비스 파드 로그 조회", "pod"),
        ];
        for (text, label) in cases {
            assert_eq!(extractor().extract(text).selector_label.as_deref(), Some(label), "{}", text);
        }
    }

    #[test]
    fn test_keyword_nouns_are_not_namespaces_or_containers() {
        let filters = extractor().extract("로그 컨테이너 파드 네임스페이스");
        assert_eq!(filters.container, None);
        assert_eq!(filters.namespace, None);
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(extractor().extract("파드 목록"), FilterSet::default());
        assert_eq!(extractor().extract(""), FilterSet::default());
    }

    #[test]
    fn test_canonicalize_identity_when_unknown() {
        assert_eq!(extractor().canonicalize("api"), "api");
        assert_eq!(extractor().canonicalize("포드"), "pod");
    }

    proptest! {
        #[test]
        fn prop_scope_all_excludes_namespace(
            words in proptest::collection::vec(
                prop_oneof![
                    Just("모든"), Just("전체"), Just("네임스페이스"), Just("네임스페이스의"),
                    Just("ns"), Just("-n"), Just("default"), Just("kube-system"), Just("all"),
                    Just("파드"), Just("목록"), Just("앱"), Just("api"),
                ],
                0..10,
            )
        ) {
            let filters = extractor().extract(&words.join(" "));
            prop_assert!(!(filters.scope_all && filters.namespace.is_some()));
        }
    }
}
