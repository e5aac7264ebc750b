//! Lenient extraction of structured values from LLM output

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref INTEGER_RE: Regex = Regex::new(r"-?\d+").unwrap();
}

/// Parse the JSON object or array embedded in a response.
///
/// Handles markdown code fences and leading or trailing prose.
pub fn extract_json(response: &str) -> Option<Value> {
    let trimmed = response.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Some(value);
                }
            }
        }
    }

    None
}

/// First integer token in free text
pub fn first_integer(response: &str) -> Option<i64> {
    INTEGER_RE
        .find_iter(response)
        .find_map(|m| m.as_str().parse().ok())
}

/// Number from a JSON value that may be encoded as a string
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Cut `text` to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
