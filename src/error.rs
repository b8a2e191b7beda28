use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned while loading condition and quest documents.
///
/// Evaluation itself never fails: ill-typed or unknown clauses evaluate to `false`.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The document is not a well-formed condition (e.g., `$or` operand is not an array).
    #[error("invalid condition: {0}")]
    InvalidCondition(String),
    /// Bucketing hash version is not one of the supported versions.
    #[error("unsupported hash version: {0}")]
    UnsupportedHashVersion(u8),
    // serde_json::Error is not clonable, so we're wrapping it in an Arc.
    /// The document is not valid JSON or does not match the expected shape.
    #[error(transparent)]
    Json(Arc<serde_json::Error>),
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Arc::new(value))
    }
}
