//! Encoders that turn loosely structured cells into the JSON array tokens the
//! target CRM expects for multi-value fields (tags, emails, phones).
//!
//! Every encoder is total: any input, including missing or malformed values,
//! yields either `[]` or a populated array.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::constants::{is_missing, EMPTY_ARRAY};

static CALLING_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\+\d{1,3})\s*(.*)").expect("valid calling code regex"));

/// One entry of a phone array field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneEntry {
    pub number: String,
    pub calling_code: String,
    pub country_code: String,
}

/// How a column is turned into an array token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayCodec {
    Phone,
    StringArray,
    CommaList,
}

impl ArrayCodec {
    pub fn encode(&self, raw: Option<&str>, calling_codes: &HashMap<String, String>) -> String {
        match self {
            ArrayCodec::Phone => encode_phone(raw, calling_codes),
            ArrayCodec::StringArray => encode_string_array(raw),
            ArrayCodec::CommaList => encode_comma_list(raw),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArrayCodec::Phone => "phone",
            ArrayCodec::StringArray => "string_array",
            ArrayCodec::CommaList => "comma_list",
        }
    }
}

fn to_token<T: Serialize>(items: &[T]) -> String {
    if items.is_empty() {
        return EMPTY_ARRAY.to_string();
    }
    serde_json::to_string(items).unwrap_or_else(|_| EMPTY_ARRAY.to_string())
}

/// Parse a phone cell into a single-element phone array.
///
/// A value must start with `+` and 1-3 digits (after surrounding brackets and
/// quotes from an earlier serialization are removed); anything else gives `[]`
/// rather than a guessed calling code. Unknown calling codes keep an empty
/// `countryCode`.
pub fn parse_phone(raw: Option<&str>, calling_codes: &HashMap<String, String>) -> Option<PhoneEntry> {
    let raw = raw?;
    if is_missing(Some(raw)) || raw.trim() == EMPTY_ARRAY {
        return None;
    }

    let unwrapped = raw
        .trim_matches(|c| c == '[' || c == ']')
        .trim_matches('"');

    let caps = CALLING_CODE_RE.captures(unwrapped)?;
    let calling_code = caps.get(1)?.as_str().to_string();
    let number: String = caps
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let country_code = calling_codes.get(&calling_code).cloned().unwrap_or_default();

    Some(PhoneEntry {
        number,
        calling_code,
        country_code,
    })
}

pub fn encode_phone(raw: Option<&str>, calling_codes: &HashMap<String, String>) -> String {
    match parse_phone(raw, calling_codes) {
        Some(entry) => to_token(&[entry]),
        None => EMPTY_ARRAY.to_string(),
    }
}

/// Wrap a scalar, as given, in a one-element string array.
pub fn encode_string_array(raw: Option<&str>) -> String {
    match raw {
        Some(v) if !is_missing(Some(v)) => to_token(&[v]),
        _ => EMPTY_ARRAY.to_string(),
    }
}

/// Split a comma-separated cell into trimmed, non-empty items.
pub fn encode_comma_list(raw: Option<&str>) -> String {
    match raw {
        Some(v) if !is_missing(Some(v)) => {
            let items: Vec<&str> = v
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .collect();
            to_token(&items)
        }
        _ => EMPTY_ARRAY.to_string(),
    }
}
