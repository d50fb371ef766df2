//! Record storage for the entity graph cache.
//!
//! This crate implements the flat arena behind the cache: a mapping from
//! [`IdentityKey`](egc_types::IdentityKey) to [`Record`](egc_types::Record).
//! Records point at each other only through references (keys), never through
//! direct pointers, so cycles in the entity graph cost nothing.
//!
//! # Merge Policy
//!
//! Incoming records merge into existing ones field by field (see [`merge`]):
//!
//! - scalars and references are overwritten (last write wins),
//! - lists are replaced wholesale,
//! - inline objects merge recursively,
//! - fields absent from the incoming record are left untouched.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based store behind a `RwLock`
//!
//! # Design Rules
//!
//! 1. A [`WriteBatch`] is applied under a single write lock: readers see all
//!    of it or none of it.
//! 2. Readers take one read guard per traversal ([`RecordStore::view`]), so a
//!    read never straddles two writes.
//! 3. Records are never deleted implicitly; [`RecordStore::evict`] and
//!    [`RecordStore::retain_reachable`] are the only removal paths.
//! 4. Lock poisoning surfaces as [`StoreError::LockPoisoned`], never a panic.

pub mod batch;
pub mod error;
pub mod memory;
pub mod merge;
pub mod reach;
pub mod traits;

pub use batch::WriteBatch;
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryRecordStore, StoreView};
pub use merge::{merge_record, merge_value};
pub use reach::reachable;
pub use traits::{RecordSource, RecordStore};
