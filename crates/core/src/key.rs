use sha2::{Digest, Sha256};

use crate::citation::Citation;
use crate::verification::Verification;

/// Keys are truncated hex digests: 16 chars ≈ 64 bits, convenience-level
/// collision resistance for citations within one document or session.
pub const KEY_LEN: usize = 16;

const FIELD_SEP: char = '|';

/// Deterministic join key for a citation. Identity fields only: the ordinal
/// `citation_number` is excluded so repeated citations of the same fact share
/// a key. URL fields join the digest only when the citation actually carries
/// a URL, so a document citation and a URL-shaped citation with identical base
/// fields and no URL data land on the same key.
pub fn citation_key(citation: &Citation) -> String {
    let mut fields: Vec<String> = vec![
        opt_str(&citation.attachment_id),
        citation
            .page_number
            .map(|p| p.to_string())
            .unwrap_or_default(),
        opt_str(&citation.full_phrase),
        opt_str(&citation.anchor_text),
        joined_ids(&citation.line_ids),
        citation
            .timestamps
            .as_ref()
            .and_then(|ts| ts.start.clone())
            .unwrap_or_default(),
        citation
            .timestamps
            .as_ref()
            .and_then(|ts| ts.end.clone())
            .unwrap_or_default(),
    ];
    if citation.is_url_citation() {
        fields.push(opt_str(&citation.url));
        fields.push(opt_str(&citation.title));
        fields.push(opt_str(&citation.domain));
    }
    digest(&fields)
}

/// Companion key for a verification payload, over the server-confirmed
/// fields. Independent of `citation_key`: verification records are shaped
/// differently from citations.
pub fn verification_key(verification: &Verification) -> String {
    let fields = vec![
        opt_str(&verification.attachment_id),
        verification
            .page_number
            .map(|p| p.to_string())
            .unwrap_or_default(),
        opt_str(&verification.full_phrase),
        opt_str(&verification.anchor_text),
        opt_str(&verification.snippet),
        joined_ids(&verification.line_ids),
        opt_str(&verification.url),
    ];
    digest(&fields)
}

fn digest(fields: &[String]) -> String {
    let mut hasher = Sha256::new();
    let mut first = true;
    for field in fields {
        if !first {
            hasher.update([FIELD_SEP as u8]);
        }
        hasher.update(field.as_bytes());
        first = false;
    }
    let mut out = hex::encode(hasher.finalize());
    out.truncate(KEY_LEN);
    out
}

fn opt_str(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn joined_ids(ids: &Option<Vec<u32>>) -> String {
    ids.as_ref()
        .map(|ids| {
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}
