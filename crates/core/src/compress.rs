use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;

use crate::error::{CiteError, Result};
use crate::scanner::MAX_SCAN_LEN;

/// Prefix → full identifier table produced by compression and required for
/// exact decompression. Ephemeral: created per call, discarded after the
/// prompt round trip.
pub type PrefixMap = IndexMap<String, String>;

/// Shortest prefix assigned to any identifier; grown one character at a time
/// until it disambiguates against every other supplied identifier.
const MIN_PREFIX_LEN: usize = 6;

// Substitution happens only in recognized ID attribute positions. The name
// alternation covers the whole attachment_id/file_id alias family in any
// casing; one value alternative per quote character so escaped quotes stay
// inside the value. Group 1 keeps the original name spelling and the
// whitespace around `=` for byte-exact reconstruction.
static ID_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)(\b(?i:attachment_?id|file_?id)\s*=\s*)(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'|`((?:[^`\\]|\\.)*)`)"#,
    )
    .expect("id attribute regex")
});

/// Result of compressing one text blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub text: String,
    pub prefix_map: PrefixMap,
}

/// Result of compressing a structured payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedValue {
    pub value: Value,
    pub prefix_map: PrefixMap,
}

/// Replace every occurrence of each supplied identifier inside ID attribute
/// values with its shortest unique prefix. Everything else in the text,
/// including attribute-name spelling, quote characters, and escaped quotes,
/// is left untouched so decompression can reproduce the input byte for byte.
pub fn compress_prompt_ids(text: &str, full_ids: &[String]) -> Result<Compressed> {
    check_len(text)?;
    let prefix_map = assign_prefixes(full_ids);
    if prefix_map.is_empty() {
        return Ok(Compressed {
            text: text.to_string(),
            prefix_map,
        });
    }
    let by_full: IndexMap<&str, &str> = prefix_map
        .iter()
        .map(|(prefix, full)| (full.as_str(), prefix.as_str()))
        .collect();
    let compressed = substitute_id_values(text, &by_full);
    Ok(Compressed {
        text: compressed,
        prefix_map,
    })
}

/// Exact inverse of [`compress_prompt_ids`] given the prefix map it returned.
pub fn decompress_prompt_ids(text: &str, prefix_map: &PrefixMap) -> Result<String> {
    check_len(text)?;
    if prefix_map.is_empty() {
        return Ok(text.to_string());
    }
    let table: IndexMap<&str, &str> = prefix_map
        .iter()
        .map(|(prefix, full)| (prefix.as_str(), full.as_str()))
        .collect();
    Ok(substitute_id_values(text, &table))
}

/// Compress a structured payload: every string leaf (object fields and array
/// elements, recursively) gets the same substitution as plain text. An
/// unserializable payload fails loudly rather than corrupting the prompt.
pub fn compress_prompt_value<T: Serialize>(payload: &T, full_ids: &[String]) -> Result<CompressedValue> {
    let value = serde_json::to_value(payload).map_err(CiteError::Serialize)?;
    let prefix_map = assign_prefixes(full_ids);
    if prefix_map.is_empty() {
        return Ok(CompressedValue { value, prefix_map });
    }
    let by_full: IndexMap<&str, &str> = prefix_map
        .iter()
        .map(|(prefix, full)| (full.as_str(), prefix.as_str()))
        .collect();
    let value = rewrite_value(value, &by_full)?;
    Ok(CompressedValue { value, prefix_map })
}

/// Structured inverse of [`compress_prompt_value`].
pub fn decompress_prompt_value(value: &Value, prefix_map: &PrefixMap) -> Result<Value> {
    if prefix_map.is_empty() {
        return Ok(value.clone());
    }
    let table: IndexMap<&str, &str> = prefix_map
        .iter()
        .map(|(prefix, full)| (prefix.as_str(), full.as_str()))
        .collect();
    rewrite_value(value.clone(), &table)
}

/// One prefix per distinct identifier: at least [`MIN_PREFIX_LEN`] chars,
/// extended until no other supplied identifier shares it. An identifier that
/// is itself a prefix of another, or no longer than the minimum, maps to
/// itself in full. Duplicates are deduplicated.
fn assign_prefixes(full_ids: &[String]) -> PrefixMap {
    let mut distinct: Vec<&str> = Vec::new();
    for id in full_ids {
        if !id.is_empty() && !distinct.contains(&id.as_str()) {
            distinct.push(id);
        }
    }
    let mut map = PrefixMap::new();
    for id in &distinct {
        let prefix = unique_prefix(id, &distinct);
        map.insert(prefix, (*id).to_string());
    }
    map
}

fn unique_prefix(id: &str, all: &[&str]) -> String {
    let boundaries: Vec<usize> = id
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(id.len()))
        .collect();
    // boundaries[n] is the byte offset after n chars
    for n in MIN_PREFIX_LEN..boundaries.len() {
        let candidate = &id[..boundaries[n]];
        let ambiguous = all
            .iter()
            .any(|other| *other != id && other.starts_with(candidate));
        if !ambiguous {
            return candidate.to_string();
        }
    }
    id.to_string()
}

fn substitute_id_values(text: &str, table: &IndexMap<&str, &str>) -> String {
    ID_ATTR_RE
        .replace_all(text, |caps: &Captures| {
            let (quote, value) = quoted_value(caps);
            match table.get(value) {
                Some(replacement) => {
                    let lead = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    format!("{lead}{quote}{replacement}{quote}")
                }
                // Not one of ours: reproduce the match verbatim.
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn quoted_value<'c>(caps: &'c Captures) -> (char, &'c str) {
    if let Some(m) = caps.get(2) {
        ('"', m.as_str())
    } else if let Some(m) = caps.get(3) {
        ('\'', m.as_str())
    } else {
        ('`', caps.get(4).map(|m| m.as_str()).unwrap_or_default())
    }
}

fn rewrite_value(value: Value, table: &IndexMap<&str, &str>) -> Result<Value> {
    Ok(match value {
        Value::String(s) => {
            check_len(&s)?;
            Value::String(substitute_id_values(&s, table))
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rewrite_value(item, table))
                .collect::<Result<_>>()?,
        ),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| Ok((k, rewrite_value(v, table)?)))
                .collect::<Result<_>>()?,
        ),
        other => other,
    })
}

fn check_len(text: &str) -> Result<()> {
    if text.len() > MAX_SCAN_LEN {
        return Err(CiteError::InputTooLarge {
            len: text.len(),
            max: MAX_SCAN_LEN,
        });
    }
    Ok(())
}
