//! Identity resolution for the entity graph cache.
//!
//! The resolver maps a raw response object plus its [`TypeDescriptor`] to an
//! [`IdentityKey`], or to nothing when the object should be stored inline in
//! its parent. Strategies form a lookup table indexed by shape metadata:
//!
//! 1. a custom function registered for the object's type name,
//! 2. the type's declared [`KeySpec`](egc_types::KeySpec),
//! 3. global composite rules (e.g. `ownerId` + `fieldKey` → `"3::cats"`),
//! 4. the default `<typename>:<id>` composition.
//!
//! Resolution is deterministic and side-effect free.
//!
//! [`TypeDescriptor`]: egc_types::TypeDescriptor
//! [`IdentityKey`]: egc_types::IdentityKey

pub mod policy;
pub mod resolver;

pub use policy::{CompositeRule, IdentityPolicy};
pub use resolver::{render_component, IdentityFn, IdentityResolver};
