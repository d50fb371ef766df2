use std::collections::BTreeMap;

use egc_types::{IdentityKey, Record};

use crate::merge::merge_record;

/// A set of record writes applied to a store as one atomic unit.
///
/// Putting the same key twice merges the records inside the batch, so an
/// entity that appears several times in one response tree still produces a
/// single write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    records: BTreeMap<IdentityKey, Record>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `record` under `key`, merging with any record already queued.
    pub fn put(&mut self, key: IdentityKey, record: Record) {
        match self.records.get_mut(&key) {
            Some(existing) => {
                merge_record(existing, record);
            }
            None => {
                self.records.insert(key, record);
            }
        }
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &IdentityKey> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &Record)> {
        self.records.iter()
    }
}

impl IntoIterator for WriteBatch {
    type Item = (IdentityKey, Record);
    type IntoIter = std::collections::btree_map::IntoIter<IdentityKey, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl FromIterator<(IdentityKey, Record)> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = (IdentityKey, Record)>>(iter: I) -> Self {
        let mut batch = WriteBatch::new();
        for (key, record) in iter {
            batch.put(key, record);
        }
        batch
    }
}
