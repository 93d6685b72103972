use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Alias table for accepted attribute spellings, keyed by the snake_case form
/// produced by `snake_name`. Legacy `file_id` names fold into `attachment_id`.
static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("attachment_id", "attachment_id"),
        ("file_id", "attachment_id"),
        ("page_number", "page_number"),
        ("full_phrase", "full_phrase"),
        ("anchor_text", "anchor_text"),
        ("line_ids", "line_ids"),
        ("start_page_id", "start_page_id"),
        ("start_time", "start_time"),
        ("end_time", "end_time"),
        ("url", "url"),
        ("title", "title"),
        ("domain", "domain"),
        ("site_name", "site_name"),
    ])
});

// One alternative per quote character; escaped quotes stay inside the value.
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)([A-Za-z][A-Za-z0-9_]*)\s*=\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'|`((?:[^`\\]|\\.)*)`)"#,
    )
    .expect("attribute regex")
});

/// Canonical name for an attribute as spelled in LLM output. `attachmentID`,
/// `attachment_ID`, `fileId` and friends all land on `attachment_id`.
pub fn canonical_attr_name(raw: &str) -> String {
    let snake = snake_name(raw);
    match ALIASES.get(snake.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => snake,
    }
}

/// Extract `name=value` pairs from the body of one citation tag. Values keep
/// their backslash escapes; malformed attributes are skipped. Never fails:
/// the input is untrusted model output.
pub fn tokenize_attributes(raw: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for caps in ATTR_RE.captures_iter(raw) {
        let name = match caps.get(1) {
            Some(m) => canonical_attr_name(m.as_str()),
            None => continue,
        };
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        attrs.insert(name, value);
    }
    attrs
}

/// Insert `_` at lower→upper camel boundaries, then lowercase.
fn snake_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    let mut prev_lower = false;
    for ch in raw.chars() {
        if ch.is_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_lowercase();
        for low in ch.to_lowercase() {
            out.push(low);
        }
    }
    out
}
