use std::collections::{BTreeSet, VecDeque};

use egc_types::IdentityKey;

use crate::traits::RecordSource;

/// Keys of every record reachable from `roots`, roots included.
///
/// Keys that are referenced but absent from `source` are not reported.
/// Cycles are fine: each key is expanded once.
pub fn reachable(source: &dyn RecordSource, roots: &[IdentityKey]) -> BTreeSet<IdentityKey> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<&IdentityKey> = roots.iter().collect();

    while let Some(key) = queue.pop_front() {
        if seen.contains(key) {
            continue;
        }
        let Some(record) = source.record(key) else {
            continue;
        };
        seen.insert(key.clone());
        for next in record.references() {
            if !seen.contains(next) {
                queue.push_back(next);
            }
        }
    }

    seen
}
