use egc_read::MissingField;
use thiserror::Error;

use crate::executor::ExecutionError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("type error: {0}")]
    Type(#[from] egc_types::TypeError),

    #[error("store error: {0}")]
    Store(#[from] egc_store::StoreError),

    #[error("normalize error: {0}")]
    Normalize(#[from] egc_normalize::NormalizeError),

    #[error("read error: {0}")]
    Read(#[from] egc_read::ReadError),

    #[error("watch error: {0}")]
    Watch(#[from] egc_watch::WatchError),

    /// The executor failed; its error is passed through untouched.
    #[error("execution failed: {0}")]
    Execution(#[source] ExecutionError),

    /// A cache-only read could not be served from the store.
    #[error("cache miss for {operation}: {} path(s) missing", missing.len())]
    CacheMiss {
        operation: String,
        missing: Vec<MissingField>,
    },

    /// The executor's response did not cover the selection.
    #[error("incomplete response for {operation}: {} path(s) missing", missing.len())]
    IncompleteResponse {
        operation: String,
        missing: Vec<MissingField>,
    },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid config: {0}")]
    Config(String),
}

pub type CacheResult<T> = Result<T, CacheError>;
