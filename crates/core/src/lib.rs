mod attr;
mod citation;
mod compress;
mod error;
mod key;
mod scanner;
mod verification;

pub use attr::{canonical_attr_name, tokenize_attributes};
pub use citation::{Citation, TimeRange};
pub use compress::{
    compress_prompt_ids, compress_prompt_value, decompress_prompt_ids, decompress_prompt_value,
    Compressed, CompressedValue, PrefixMap,
};
pub use error::{CiteError, Result};
pub use key::{citation_key, verification_key, KEY_LEN};
pub use scanner::{scan, replace_citations, visible_text, ScanOutcome, MAX_SCAN_LEN};
pub use verification::{classify, CitationStatus, Verification, VerificationStatus};
