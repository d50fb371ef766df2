use std::collections::{BTreeMap, BTreeSet, HashMap};

use egc_types::{IdentityKey, Record};

use crate::batch::WriteBatch;
use crate::error::StoreResult;

/// Read-only lookup of records by key.
///
/// Readers walk the entity graph through this trait so the same traversal
/// works against a locked store view, a plain map, or a batch under test.
pub trait RecordSource {
    fn record(&self, key: &IdentityKey) -> Option<&Record>;
}

impl RecordSource for HashMap<IdentityKey, Record> {
    fn record(&self, key: &IdentityKey) -> Option<&Record> {
        self.get(key)
    }
}

impl RecordSource for BTreeMap<IdentityKey, Record> {
    fn record(&self, key: &IdentityKey) -> Option<&Record> {
        self.get(key)
    }
}

impl RecordSource for WriteBatch {
    fn record(&self, key: &IdentityKey) -> Option<&Record> {
        self.get(key)
    }
}

/// Identity-keyed record store.
///
/// All implementations must satisfy these invariants:
/// - At most one record per key; writes for an existing key merge into it.
/// - A batch is applied atomically with respect to every reader.
/// - [`view`](RecordStore::view) holds a consistent snapshot for as long as
///   it lives; writes wait for it to be dropped.
pub trait RecordStore: Send + Sync {
    /// Read a copy of one record.
    fn get(&self, key: &IdentityKey) -> StoreResult<Option<Record>>;

    /// Check whether a record exists.
    fn contains(&self, key: &IdentityKey) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply a batch and return the keys whose stored record changed,
    /// including keys that were created.
    fn write(&self, batch: WriteBatch) -> StoreResult<BTreeSet<IdentityKey>>;

    /// Remove one record. Returns `true` if it existed.
    fn evict(&self, key: &IdentityKey) -> StoreResult<bool>;

    /// All keys, sorted.
    fn keys(&self) -> StoreResult<Vec<IdentityKey>>;

    /// Sorted copy of the entire store.
    fn extract(&self) -> StoreResult<BTreeMap<IdentityKey, Record>>;

    /// Remove every record not reachable from `roots` by following
    /// references. Returns the removed keys, sorted.
    fn retain_reachable(&self, roots: &[IdentityKey]) -> StoreResult<Vec<IdentityKey>>;

    /// Remove all records.
    fn clear(&self) -> StoreResult<()>;

    /// Consistent read-only view for a multi-record traversal.
    fn view(&self) -> StoreResult<Box<dyn RecordSource + '_>>;
}
