use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_normalization::UnicodeNormalization;

use crate::constants::{is_missing, OWNER_PLACEHOLDER};

/// Decompose into base characters plus nonspacing marks and drop those marks.
/// Spacing marks (e.g. Devanagari vowel signs) are kept.
pub fn normalize_to_ascii(text: &str) -> String {
    text.nfd()
        .filter(|c| get_general_category(*c) != GeneralCategory::NonspacingMark)
        .collect()
}

/// Derive an organizational email address from a free-text full name.
///
/// Returns an empty string for a missing, blank or `nan` name and for the
/// `-` placeholder. Otherwise every whitespace-separated token is folded to
/// ASCII, lowercased and joined with `.`, e.g.
/// `"Jürgen Müller"` → `"jurgen.muller@inheaden.io"`.
pub fn derive_email(full_name: Option<&str>, domain: &str) -> String {
    let name = match full_name {
        Some(n) if !is_missing(Some(n)) && n.trim() != OWNER_PLACEHOLDER => n,
        _ => return String::new(),
    };

    let local = name
        .split_whitespace()
        .map(|token| normalize_to_ascii(token).to_lowercase())
        .collect::<Vec<_>>()
        .join(".");

    format!("{local}@{domain}")
}
