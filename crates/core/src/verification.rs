use serde::{Deserialize, Serialize};

/// Wire status enum for a server-side verification judgment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Loading,
    Found,
    FoundAnchorTextOnly,
    FoundPhraseMissedAnchorText,
    PartialTextFound,
    FoundOnOtherPage,
    FoundOnOtherLine,
    FirstWordFound,
    NotFound,
    /// Forward compatibility: statuses this client does not know yet.
    #[serde(other)]
    Other,
}

/// Server-computed judgment of whether a cited span appears in the named
/// source. Immutable from this crate's perspective; derived timing metadata
/// lives in a side channel keyed by citation key, never stamped onto this
/// record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Verification {
    #[serde(default)]
    pub status: VerificationStatus,
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub full_phrase: Option<String>,
    #[serde(default)]
    pub anchor_text: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub line_ids: Option<Vec<u32>>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Renderer-facing flags derived from a verification status. At most one
/// terminal state is ever set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CitationStatus {
    pub is_pending: bool,
    pub is_verified: bool,
    pub is_partial_match: bool,
    pub is_miss: bool,
}

impl CitationStatus {
    pub fn pending() -> Self {
        Self {
            is_pending: true,
            ..Self::default()
        }
    }

    pub fn from_status(status: VerificationStatus) -> Self {
        use VerificationStatus::*;
        match status {
            Pending | Loading => Self::pending(),
            Found | FoundAnchorTextOnly => Self {
                is_verified: true,
                ..Self::default()
            },
            FoundPhraseMissedAnchorText | PartialTextFound | FoundOnOtherPage
            | FoundOnOtherLine | FirstWordFound => Self {
                is_verified: true,
                is_partial_match: true,
                ..Self::default()
            },
            NotFound => Self {
                is_miss: true,
                ..Self::default()
            },
            Other => Self::default(),
        }
    }
}

/// Derive status flags for a citation whose verification may not have
/// arrived yet. Pure function of the status enum.
pub fn classify(verification: Option<&Verification>) -> CitationStatus {
    match verification {
        None => CitationStatus::pending(),
        Some(v) => CitationStatus::from_status(v.status),
    }
}
