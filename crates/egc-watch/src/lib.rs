//! Watch registry for the entity graph cache.
//!
//! A watch remembers the last read of some selection and the set of keys
//! that read depended on. After every write the registry is told which keys
//! changed; watches whose dependencies intersect them are re-read and their
//! sink is told iff the outcome actually changed.
//!
//! Sinks are either a synchronous callback or a `tokio` unbounded channel.
//! Delivery happens after the registry lock is released, so a callback may
//! register or release watches itself.

pub mod error;
pub mod registry;

pub use error::{WatchError, WatchResult};
pub use registry::{WatchCallback, WatchEvent, WatchHandle, WatchId, WatchRegistry, WatchSink, WatchTarget};
