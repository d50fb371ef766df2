//! Denormalizer for the entity graph cache.
//!
//! A read walks a selection set from a root record, following references
//! through the store and copying scalars and inline objects, and rebuilds
//! the response tree the caller asked for. Every record it looks at (even
//! one that turned out to be absent) lands in the read's dependency set,
//! which the watch registry later intersects with written keys.
//!
//! A read that cannot be satisfied is not an error: it yields
//! [`ReadOutcome::Miss`] listing every missing path. Only a selection that
//! does not fit the schema fails with [`ReadError`].

pub mod error;
pub mod outcome;
pub mod reader;

pub use error::{ReadError, ReadResult};
pub use outcome::{Denormalized, MissReason, MissingField, ReadOutcome};
pub use reader::Reader;
