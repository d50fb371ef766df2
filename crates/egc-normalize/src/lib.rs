//! Normalizer for the entity graph cache.
//!
//! Walks a response tree along the requested selection set and flattens it:
//! every sub-object with an identity becomes its own [`Record`] in a
//! [`WriteBatch`] and is replaced in its parent by a reference; objects
//! without identity stay inline. Lists are normalized element by element,
//! so one list may mix references and inline values.
//!
//! [`Record`]: egc_types::Record
//! [`WriteBatch`]: egc_store::WriteBatch

pub mod error;
pub mod normalizer;

pub use error::{NormalizeError, NormalizeResult};
pub use normalizer::{Normalized, Normalizer};
