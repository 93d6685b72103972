use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Start/end markers for audio and video sources, carried verbatim from the
/// tag attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TimeRange {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// One claim-to-source link extracted from model output. Document-style
/// citations carry `attachment_id`/page/line fields; URL-style citations carry
/// `url` and friends. Both share the base fields used for key generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Citation {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub full_phrase: Option<String>,
    #[serde(default)]
    pub anchor_text: Option<String>,
    #[serde(default)]
    pub line_ids: Option<Vec<u32>>,
    #[serde(default)]
    pub timestamps: Option<TimeRange>,
    pub citation_number: u32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
}

impl Citation {
    /// Build a citation from a canonical attribute map and its 1-based
    /// position of appearance. Pure and total: malformed fields become `None`.
    pub fn from_attributes(attrs: &HashMap<String, String>, ordinal: u32) -> Self {
        let page_number = attrs
            .get("page_number")
            .and_then(|v| first_integer(v))
            .or_else(|| attrs.get("start_page_id").and_then(|v| first_integer(v)));
        let timestamps = match (attrs.get("start_time"), attrs.get("end_time")) {
            (None, None) => None,
            (start, end) => Some(TimeRange {
                start: start.map(|v| v.to_string()),
                end: end.map(|v| v.to_string()),
            }),
        };
        Self {
            attachment_id: attrs.get("attachment_id").map(|v| v.to_string()),
            page_number,
            full_phrase: attrs.get("full_phrase").map(|v| unescape_quotes(v)),
            anchor_text: attrs.get("anchor_text").map(|v| unescape_quotes(v)),
            line_ids: attrs.get("line_ids").and_then(|v| parse_line_ids(v)),
            timestamps,
            citation_number: ordinal,
            url: attrs.get("url").map(|v| v.to_string()),
            title: attrs.get("title").map(|v| unescape_quotes(v)),
            domain: attrs.get("domain").map(|v| v.to_string()),
            site_name: attrs.get("site_name").map(|v| unescape_quotes(v)),
        }
    }

    pub fn is_url_citation(&self) -> bool {
        self.url.is_some()
    }
}

/// Drop backslash escapes in front of quote characters.
pub(crate) fn unescape_quotes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some(&next) if next == '\'' || next == '"' || next == '`' => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(ch),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// First run of ASCII digits in the value, so `p. 3` and `page3of9` both
/// yield 3. Pages are 1-based, so a parsed zero is treated as absent.
fn first_integer(value: &str) -> Option<u32> {
    let start = value.find(|c: char| c.is_ascii_digit())?;
    let digits: String = value[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|n| *n >= 1)
}

fn parse_line_ids(value: &str) -> Option<Vec<u32>> {
    let ids: Vec<u32> = value
        .split(',')
        .filter_map(|tok| tok.trim().parse().ok())
        .collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn builds_document_citation() {
        let map = attrs(&[
            ("attachment_id", "abc123"),
            ("page_number", "3"),
            ("full_phrase", "Revenue grew 45% in Q4."),
            ("anchor_text", "grew 45%"),
            ("line_ids", "12,13"),
        ]);
        let citation = Citation::from_attributes(&map, 1);
        assert_eq!(citation.attachment_id.as_deref(), Some("abc123"));
        assert_eq!(citation.page_number, Some(3));
        assert_eq!(citation.line_ids, Some(vec![12, 13]));
        assert_eq!(citation.citation_number, 1);
        assert!(!citation.is_url_citation());
    }

    #[test]
    fn page_number_tolerates_noise_and_falls_back() {
        let map = attrs(&[("page_number", "p. 7 (approx)")]);
        assert_eq!(Citation::from_attributes(&map, 1).page_number, Some(7));

        let map = attrs(&[("start_page_id", "page_12_left")]);
        assert_eq!(Citation::from_attributes(&map, 1).page_number, Some(12));
    }

    #[test]
    fn zero_page_number_is_rejected() {
        let map = attrs(&[("page_number", "0")]);
        assert_eq!(Citation::from_attributes(&map, 1).page_number, None);

        let map = attrs(&[("page_number", "0"), ("start_page_id", "page_4")]);
        assert_eq!(Citation::from_attributes(&map, 1).page_number, Some(4));
    }

    #[test]
    fn line_ids_drop_non_numeric_tokens() {
        let map = attrs(&[("line_ids", "4, x, 9 ,")]);
        assert_eq!(
            Citation::from_attributes(&map, 1).line_ids,
            Some(vec![4, 9])
        );

        let map = attrs(&[("line_ids", "a, b")]);
        assert_eq!(Citation::from_attributes(&map, 1).line_ids, None);
    }

    #[test]
    fn unescapes_text_fields() {
        let map = attrs(&[("full_phrase", r#"she said \"done\""#)]);
        assert_eq!(
            Citation::from_attributes(&map, 1).full_phrase.as_deref(),
            Some(r#"she said "done""#)
        );
    }

    #[test]
    fn non_quote_escapes_are_preserved() {
        assert_eq!(unescape_quotes(r"a\nb"), r"a\nb");
        assert_eq!(unescape_quotes(r"trail\"), r"trail\");
    }

    #[test]
    fn timestamps_only_when_present() {
        let map = attrs(&[("start_time", "00:12"), ("end_time", "00:19")]);
        let citation = Citation::from_attributes(&map, 2);
        let ts = citation.timestamps.expect("timestamps");
        assert_eq!(ts.start.as_deref(), Some("00:12"));
        assert_eq!(ts.end.as_deref(), Some("00:19"));

        let citation = Citation::from_attributes(&attrs(&[]), 3);
        assert!(citation.timestamps.is_none());
    }
}
