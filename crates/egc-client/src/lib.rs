//! Consumer API for the entity graph cache.
//!
//! [`EntityCache`] ties the pieces together: it sends operations to a
//! [`QueryExecutor`], normalizes the returned tree into the record store,
//! tells the watch registry which keys changed, and answers every call with
//! a tree read back out of the store rather than the raw response. That
//! read-back is what makes two views of the same entity agree.
//!
//! ```ignore
//! let cache = EntityCache::new(schema, executor)?;
//! let people = cache.query(&all_people, &Variables::new()).await?;
//! let handle = cache.watch(&all_people, &Variables::new(), |event| {
//!     println!("people changed: {:?}", event.outcome);
//! })?;
//! cache.mutate(&update_person, &vars).await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;

pub use cache::EntityCache;
pub use config::{CacheConfig, FetchPolicy};
pub use error::{CacheError, CacheResult};
pub use executor::{ExecutionError, QueryExecutor};

pub use egc_read::{Denormalized, MissReason, MissingField, ReadOutcome};
pub use egc_watch::{WatchEvent, WatchHandle, WatchId};
