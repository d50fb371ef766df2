use egc_read::ReadError;
use egc_store::StoreError;

/// Errors produced by the watch registry.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Re-reading a watched selection failed.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// The store could not be viewed for a re-read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A registry lock was poisoned by a panicking holder.
    #[error("watch registry lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience alias used throughout the watch crate.
pub type WatchResult<T> = std::result::Result<T, WatchError>;
