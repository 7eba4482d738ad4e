use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize cache metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}
