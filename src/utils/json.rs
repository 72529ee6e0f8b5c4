//! Defensive parsing of structured model output.
//!
//! Models asked for JSON frequently wrap it in code fences, prepend prose,
//! or emit trailing commas. Parsing is an explicitly ordered chain of pure
//! strategies: direct parse, fence stripping, balanced bracket extraction,
//! trailing-comma repair. Each strategy is independently testable; the
//! chain stops at the first success.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static RE_CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());
static RE_TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Parse a model response that is expected to contain a JSON object or array.
///
/// Returns `None` once every strategy is exhausted; the caller decides how
/// to surface that (and should log only the text length, not the text).
pub fn parse_json_response(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let unfenced = strip_code_fences(trimmed);
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Some(value);
    }

    let candidate = extract_balanced(unfenced).unwrap_or(unfenced);
    if let Ok(value) = serde_json::from_str(candidate) {
        return Some(value);
    }

    let repaired = strip_trailing_commas(candidate);
    serde_json::from_str(&repaired).ok()
}

/// Remove a surrounding markdown code fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    match RE_CODE_FENCE.captures(text) {
        Some(caps) => caps.get(1).map_or(text, |m| m.as_str().trim()),
        None => text,
    }
}

/// Extract the first balanced `{...}` or `[...]` region.
///
/// Scans with a depth counter that is string- and escape-aware, so braces
/// inside JSON string values do not terminate the region early.
pub fn extract_balanced(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let (open, close) = match bytes[start] {
        b'{' => (b'{', b'}'),
        _ => (b'[', b']'),
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Remove commas that directly precede a closing bracket.
pub fn strip_trailing_commas(text: &str) -> String {
    RE_TRAILING_COMMA.replace_all(text, "$1").into_owned()
}
