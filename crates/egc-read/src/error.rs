use egc_types::TypeError;
use thiserror::Error;

/// Errors that can occur while reading from the store.
///
/// Missing data is reported through [`ReadOutcome::Miss`](crate::ReadOutcome),
/// never through this type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    /// The selection does not fit the schema.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Convenience type alias for reads.
pub type ReadResult<T> = Result<T, ReadError>;
