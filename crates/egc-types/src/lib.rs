//! Foundation types for the entity graph cache (EGC).
//!
//! This crate provides the identity, record, and shape types shared by every
//! other EGC crate. Nothing here performs normalization or reads; it only
//! defines what those stages produce and consume.
//!
//! # Key Types
//!
//! - [`IdentityKey`]: Stable string naming one logical entity
//! - [`Reference`]: Pointer-by-key from one record position to another record
//! - [`FieldValue`]: Scalar, reference, list, or inline object stored in a record
//! - [`Record`]: Flattened field map for one entity (or one inline object)
//! - [`Schema`] / [`TypeDescriptor`]: Static shape metadata per object type
//! - [`Operation`] / [`SelectionSet`]: The requested shape of a read or write

pub mod error;
pub mod key;
pub mod record;
pub mod schema;
pub mod selection;

pub use error::{TypeError, TypeResult};
pub use key::{IdentityKey, Reference};
pub use record::{FieldValue, Record};
pub use schema::{FieldKind, KeySpec, Schema, TypeDescriptor};
pub use selection::{ArgValue, FieldSelection, Operation, OperationKind, SelectionSet, Variables};

/// Name of the implicit field carrying an object's concrete type.
pub const TYPENAME_FIELD: &str = "__typename";
