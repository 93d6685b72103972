use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiteError {
    #[error("input too large: {len} bytes (limit {max})")]
    InputTooLarge { len: usize, max: usize },
    #[error("unserializable prompt payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CiteError>;
