//! Text normalization ahead of intent matching
//!
//! raw text -> trim + lowercase -> strip politeness ending -> drop particle
//! tokens -> collapse whitespace. The steps repeat until the text stops
//! changing, so `normalize` is idempotent even when removing one ending
//! exposes another ("목록 좀 보여줘" -> "목록 좀" -> "목록").

/// Sentence endings and softeners removed from the end of a request.
///
/// Longest first, so "확인해줘" is stripped whole rather than leaving "확인해".
const POLITE_ENDINGS: &[&str] = &[
    "확인해줘",
    "부탁해",
    "보여줘",
    "알려줘",
    "주세요",
    "봐줘",
    "줄래",
    "볼래",
    "해봐",
    "줘",
    "좀",
];

/// Grammatical particles dropped when they stand alone as a token.
const PARTICLES: &[&str] = &[
    "을", "를", "이", "가", "은", "는", "에", "에서", "으로", "로", "와", "과", "도", "만", "까지",
    "부터",
];

/// Normalize raw request text. Total; never fails.
pub fn normalize(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_once(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let stripped = strip_polite_ending(&lowered);

    stripped
        .split_whitespace()
        .filter(|token| !PARTICLES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_polite_ending(text: &str) -> &str {
    POLITE_ENDINGS
        .iter()
        .find_map(|ending| text.strip_suffix(ending))
        .map(str::trim_end)
        .unwrap_or(text)
}
