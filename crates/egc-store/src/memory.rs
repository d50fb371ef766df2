use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use egc_types::{IdentityKey, Record};

use crate::batch::WriteBatch;
use crate::error::{StoreError, StoreResult};
use crate::merge::merge_record;
use crate::reach::reachable;
use crate::traits::{RecordSource, RecordStore};

/// In-memory, HashMap-based record store.
///
/// All records live behind one `RwLock`: batches take the write lock once and
/// apply every record before releasing it, and readers hold the read lock
/// for the whole traversal through a [`StoreView`].
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<IdentityKey, Record>>,
}

/// Read guard over an [`InMemoryRecordStore`].
pub struct StoreView<'a> {
    records: RwLockReadGuard<'a, HashMap<IdentityKey, Record>>,
}

impl RecordSource for StoreView<'_> {
    fn record(&self, key: &IdentityKey) -> Option<&Record> {
        self.records.get(key)
    }
}

impl StoreView<'_> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.read_lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed read guard; [`RecordStore::view`] boxes the same thing.
    pub fn read_view(&self) -> StoreResult<StoreView<'_>> {
        Ok(StoreView {
            records: self.read_lock()?,
        })
    }

    fn read_lock(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<IdentityKey, Record>>> {
        self.records
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_lock(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<IdentityKey, Record>>> {
        self.records
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, key: &IdentityKey) -> StoreResult<Option<Record>> {
        Ok(self.read_lock()?.get(key).cloned())
    }

    fn contains(&self, key: &IdentityKey) -> StoreResult<bool> {
        Ok(self.read_lock()?.contains_key(key))
    }

    fn write(&self, batch: WriteBatch) -> StoreResult<BTreeSet<IdentityKey>> {
        let size = batch.len();
        let mut touched = BTreeSet::new();
        let mut map = self.write_lock()?;
        for (key, incoming) in batch {
            match map.get_mut(&key) {
                Some(existing) => {
                    if merge_record(existing, incoming) {
                        touched.insert(key);
                    }
                }
                None => {
                    map.insert(key.clone(), incoming);
                    touched.insert(key);
                }
            }
        }
        drop(map);
        debug!(records = size, touched = touched.len(), "batch written");
        Ok(touched)
    }

    fn evict(&self, key: &IdentityKey) -> StoreResult<bool> {
        let removed = self.write_lock()?.remove(key).is_some();
        if removed {
            debug!(key = %key, "record evicted");
        }
        Ok(removed)
    }

    fn keys(&self) -> StoreResult<Vec<IdentityKey>> {
        let map = self.read_lock()?;
        let mut keys: Vec<IdentityKey> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn extract(&self) -> StoreResult<BTreeMap<IdentityKey, Record>> {
        let map = self.read_lock()?;
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn retain_reachable(&self, roots: &[IdentityKey]) -> StoreResult<Vec<IdentityKey>> {
        let mut map = self.write_lock()?;
        let live = reachable(&*map, roots);
        let mut evicted: Vec<IdentityKey> = map
            .keys()
            .filter(|key| !live.contains(*key))
            .cloned()
            .collect();
        for key in &evicted {
            map.remove(key);
        }
        evicted.sort();
        debug!(
            roots = roots.len(),
            live = live.len(),
            evicted = evicted.len(),
            "reachability sweep"
        );
        Ok(evicted)
    }

    fn clear(&self) -> StoreResult<()> {
        self.write_lock()?.clear();
        Ok(())
    }

    fn view(&self) -> StoreResult<Box<dyn RecordSource + '_>> {
        Ok(Box::new(self.read_view()?))
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .finish()
    }
}
