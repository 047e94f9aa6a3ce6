//! Text-shape heuristics shared by detection and auto-adoption.

use regex::Regex;
use std::sync::LazyLock;

/// Glyphs that OCR emits in place of characters it could not read.
pub const GARBLED_CHARS: [char; 4] = ['\u{fffd}', '\u{25a1}', '\u{25a0}', '?'];

/// Shapes that suggest an OCR failure even without replacement glyphs.
static SUSPICIOUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[\u{fffd}\u{25a1}\u{25a0}]{2,}", // runs of garbled glyphs
        r"[\?\!]{3,}",                     // excessive punctuation
        r"[a-z][A-Z]{3,}[a-z]",            // mixed case anomaly
        r"\d[a-zA-Z]\d[a-zA-Z]",           // alternating digit/letter
    ]
    .iter()
    .map(|p| Regex::new(p).expect("suspicious pattern must compile"))
    .collect()
});

/// Shapes that must never be auto-corrected: numbers, URLs, emails,
/// dates, currency amounts, product codes, phone-like triplets.
static SENSITIVE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d{4,}",
        r"https?://",
        r"www\.",
        r"[\w.-]+@[\w.-]+\.\w+",
        r"\d{4}[-/]\d{1,2}[-/]\d{1,2}",
        r"[\d,]+円",
        r"\$[\d,]+",
        r"[A-Z]{2,}\d+",
        r"\d+-\d+-\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("sensitive pattern must compile"))
    .collect()
});

static KATAKANA_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\u{30a1}-\u{30f6}\u{30fc}]+$").unwrap());
static KANJI_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\u{4e00}-\u{9fa5}]+$").unwrap());
static CAPITALIZED_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z][a-z]+$").unwrap());

pub fn is_garbled_char(c: char) -> bool {
    GARBLED_CHARS.contains(&c)
}

pub fn contains_garbled_char(text: &str) -> bool {
    text.chars().any(is_garbled_char)
}

/// Distinct garbled glyphs in first-seen order.
pub fn garbled_chars_in(text: &str) -> Vec<char> {
    let mut found = Vec::new();
    for c in text.chars() {
        if is_garbled_char(c) && !found.contains(&c) {
            found.push(c);
        }
    }
    found
}

pub fn matches_suspicious_pattern(text: &str) -> bool {
    SUSPICIOUS_PATTERNS.iter().any(|p| p.is_match(text))
}

pub fn contains_sensitive_pattern(text: &str) -> bool {
    SENSITIVE_PATTERNS.iter().any(|p| p.is_match(text))
}

/// Pure katakana run (<=10 chars), short kanji run (<=4 chars), or a
/// single capitalized word: likely a name, so review is required.
pub fn looks_like_proper_noun(text: &str) -> bool {
    let len = text.chars().count();

    if KATAKANA_RUN.is_match(text) && len <= 10 {
        return true;
    }
    if KANJI_RUN.is_match(text) && len <= 4 {
        return true;
    }
    CAPITALIZED_WORD.is_match(text)
}

/// Character-set Jaccard similarity over lower-cased, trimmed texts.
/// Identical strings score 1.0; an empty input scores 0.0.
pub fn text_similarity(text1: &str, text2: &str) -> f32 {
    if text1.is_empty() || text2.is_empty() {
        return 0.0;
    }

    let t1 = text1.trim().to_lowercase();
    let t2 = text2.trim().to_lowercase();

    if t1 == t2 {
        return 1.0;
    }

    let chars1: std::collections::HashSet<char> = t1.chars().collect();
    let chars2: std::collections::HashSet<char> = t2.chars().collect();

    let intersection = chars1.intersection(&chars2).count();
    let union = chars1.union(&chars2).count();

    if union == 0 {
        return 0.0;
    }

    intersection as f32 / union as f32
}
