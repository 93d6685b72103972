use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use crate::attr::tokenize_attributes;
use crate::citation::Citation;
use crate::key::citation_key;

/// Ceiling applied before any pattern match runs. Model output is untrusted,
/// so the scanner refuses to regex-scan pathological blobs and treats them as
/// plain text instead.
pub const MAX_SCAN_LEN: usize = 1_000_000;

// Self-closing tag, case-sensitive open, body bounded by the nearest `>` so a
// match can never cross a tag boundary.
static CITE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<cite\s([^>]*?)/>").expect("cite tag regex"));

// Auxiliary metadata block some output modes append after the prose. An
// unterminated block strips to end of input.
static CITATION_DATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<citation_data>(?:.*?</citation_data>|.*$)").expect("citation data regex")
});

/// Citations found in one pass over a text blob, in document order.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Every tag occurrence, each with its own 1-based `citation_number`.
    pub citations: Vec<Citation>,
    /// Key → citation map for joining verification results. Occurrences with
    /// the same key collapse; the later one wins.
    pub by_key: IndexMap<String, Citation>,
}

/// Find every citation tag in `text` in left-to-right order.
pub fn scan(text: &str) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    if !within_scan_limit(text) {
        return outcome;
    }
    for caps in CITE_TAG_RE.captures_iter(text) {
        let citation = citation_from_captures(&caps, outcome.citations.len() as u32 + 1);
        outcome
            .by_key
            .insert(citation_key(&citation), citation.clone());
        outcome.citations.push(citation);
    }
    outcome
}

/// Replace every citation tag with caller-supplied markup, returning the
/// rendered text and the key → citation map. Renderers pass their own
/// target-specific substitution here.
pub fn replace_citations<F>(text: &str, mut render: F) -> (String, IndexMap<String, Citation>)
where
    F: FnMut(&Citation) -> String,
{
    if !within_scan_limit(text) {
        return (text.to_string(), IndexMap::new());
    }
    let mut by_key = IndexMap::new();
    let mut ordinal = 0u32;
    let rendered = CITE_TAG_RE.replace_all(text, |caps: &Captures| {
        ordinal += 1;
        let citation = citation_from_captures(caps, ordinal);
        let markup = render(&citation);
        by_key.insert(citation_key(&citation), citation);
        markup
    });
    (rendered.into_owned(), by_key)
}

/// User-visible prose: inline tags and any auxiliary citation-data block
/// removed. On any parse ambiguity content stays as plain text rather than
/// being guessed at.
pub fn visible_text(text: &str) -> String {
    if !within_scan_limit(text) {
        return text.to_string();
    }
    let without_block = CITATION_DATA_RE.replace_all(text, "");
    CITE_TAG_RE.replace_all(&without_block, "").into_owned()
}

fn citation_from_captures(caps: &Captures, ordinal: u32) -> Citation {
    let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    Citation::from_attributes(&tokenize_attributes(body), ordinal)
}

fn within_scan_limit(text: &str) -> bool {
    if text.len() > MAX_SCAN_LEN {
        warn!(len = text.len(), max = MAX_SCAN_LEN, "input exceeds scan limit, treating as plain text");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Revenue grew 45%<cite attachment_id='abc123' page_number='3' \
        full_phrase='Revenue grew 45% in Q4.' anchor_text='grew 45%' line_ids='12,13' /> \
        according to reports.";

    #[test]
    fn finds_citations_in_document_order() {
        let outcome = scan(SAMPLE);
        assert_eq!(outcome.citations.len(), 1);
        let citation = &outcome.citations[0];
        assert_eq!(citation.attachment_id.as_deref(), Some("abc123"));
        assert_eq!(citation.page_number, Some(3));
        assert_eq!(citation.line_ids, Some(vec![12, 13]));
        assert_eq!(citation.citation_number, 1);
        assert_eq!(outcome.by_key.len(), 1);
    }

    #[test]
    fn ordinals_increment_while_duplicate_keys_collapse() {
        let tag = "<cite attachment_id='a' full_phrase='same fact' />";
        let text = format!("one {tag} two {tag} three");
        let outcome = scan(&text);
        assert_eq!(outcome.citations.len(), 2);
        assert_eq!(outcome.citations[0].citation_number, 1);
        assert_eq!(outcome.citations[1].citation_number, 2);
        assert_eq!(outcome.by_key.len(), 1);
        assert_eq!(
            outcome.by_key.values().next().map(|c| c.citation_number),
            Some(2)
        );
    }

    #[test]
    fn does_not_match_across_tag_boundaries() {
        let text = "<cite attachment_id='a' /> plain <b>bold</b> <cite attachment_id='b' />";
        let outcome = scan(text);
        assert_eq!(outcome.citations.len(), 2);
        assert_eq!(outcome.citations[1].attachment_id.as_deref(), Some("b"));
    }

    #[test]
    fn replaces_tags_with_caller_markup() {
        let (rendered, by_key) =
            replace_citations(SAMPLE, |c| format!("[{}]", c.citation_number));
        assert_eq!(
            rendered,
            "Revenue grew 45%[1] according to reports."
        );
        assert_eq!(by_key.len(), 1);
    }

    #[test]
    fn strips_citation_data_block_from_visible_text() {
        let text = "Answer here.<cite attachment_id='a' />\n<citation_data>\nkey: value\n</citation_data>";
        assert_eq!(visible_text(text), "Answer here.\n");

        let truncated = "Answer.<citation_data>partial";
        assert_eq!(visible_text(truncated), "Answer.");
    }

    #[test]
    fn oversized_input_degrades_to_plain_text() {
        let mut text = String::with_capacity(MAX_SCAN_LEN + 64);
        text.push_str("<cite attachment_id='a' />");
        text.push_str(&"x".repeat(MAX_SCAN_LEN));
        let outcome = scan(&text);
        assert!(outcome.citations.is_empty());
        let (rendered, by_key) = replace_citations(&text, |_| "[1]".to_string());
        assert_eq!(rendered, text);
        assert!(by_key.is_empty());
    }

    #[test]
    fn malformed_tags_stay_as_plain_text() {
        let text = "before <cite attachment_id='open ended after";
        let outcome = scan(text);
        assert!(outcome.citations.is_empty());
        assert_eq!(visible_text(text), text);
    }
}
