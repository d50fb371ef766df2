use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use egc_read::{Denormalized, ReadOutcome};
use egc_types::{IdentityKey, SelectionSet, Variables};

use crate::error::{WatchError, WatchResult};

/// Identifier of one registered watch, unique per registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

impl WatchId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// What a watch reads: a selection of type `type_name` rooted at `root`.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchTarget {
    pub root: IdentityKey,
    pub type_name: String,
    pub selection: SelectionSet,
    pub variables: Variables,
}

/// Delivered to a sink when a watched read changes.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchEvent {
    pub id: WatchId,
    pub outcome: ReadOutcome,
}

pub type WatchCallback = Box<dyn FnMut(&WatchEvent) + Send>;

/// Where change events go.
pub enum WatchSink {
    /// Called synchronously from the notifying thread.
    Callback(WatchCallback),
    /// Queued for the receiver; a dropped receiver ends the watch.
    Channel(mpsc::UnboundedSender<WatchEvent>),
}

impl WatchSink {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnMut(&WatchEvent) + Send + 'static,
    {
        WatchSink::Callback(Box::new(f))
    }

    /// A channel sink plus the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (WatchSink::Channel(tx), rx)
    }

    /// Deliver one event. Returns `false` if the sink can never accept
    /// another one.
    fn deliver(&mut self, event: &WatchEvent) -> bool {
        match self {
            WatchSink::Callback(f) => {
                f(event);
                true
            }
            WatchSink::Channel(tx) => tx.send(event.clone()).is_ok(),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            WatchSink::Callback(_) => false,
            WatchSink::Channel(tx) => tx.is_closed(),
        }
    }
}

impl fmt::Debug for WatchSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSink::Callback(_) => f.write_str("WatchSink::Callback"),
            WatchSink::Channel(_) => f.write_str("WatchSink::Channel"),
        }
    }
}

/// A value tagged with the notify generation that produced it.
struct Stamped<T> {
    value: T,
    generation: u64,
}

impl<T> Stamped<T> {
    fn initial(value: T) -> Self {
        Self { value, generation: 0 }
    }
}

/// One registered watch.
///
/// `last` only moves to a read from a newer generation, and the sink only
/// receives events newer than the last one it accepted, so overlapping
/// notifications never step a watch backwards.
struct Watch {
    id: WatchId,
    target: WatchTarget,
    last: Mutex<Stamped<Denormalized>>,
    sink: Mutex<Stamped<WatchSink>>,
    active: AtomicBool,
}

impl Watch {
    fn is_live(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

struct RegistryInner {
    watches: RwLock<BTreeMap<WatchId, Arc<Watch>>>,
    next_id: AtomicU64,
    generation: AtomicU64,
}

impl RegistryInner {
    fn remove(&self, id: WatchId) -> WatchResult<bool> {
        let removed = self
            .watches
            .write()
            .map_err(|e| WatchError::LockPoisoned(e.to_string()))?
            .remove(&id);
        Ok(match removed {
            Some(watch) => {
                watch.active.store(false, Ordering::Release);
                true
            }
            None => false,
        })
    }
}

/// Registry of live watches.
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Clone)]
pub struct WatchRegistry {
    inner: Arc<RegistryInner>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                watches: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Register a watch whose current read is `initial`.
    ///
    /// Nothing is delivered for `initial` itself; the caller already has it.
    pub fn register(
        &self,
        target: WatchTarget,
        initial: Denormalized,
        sink: WatchSink,
    ) -> WatchResult<WatchHandle> {
        let id = WatchId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let watch = Arc::new(Watch {
            id,
            target,
            last: Mutex::new(Stamped::initial(initial)),
            sink: Mutex::new(Stamped::initial(sink)),
            active: AtomicBool::new(true),
        });
        self.write_watches()?.insert(id, Arc::clone(&watch));
        debug!(id = %id, root = %watch.target.root, "watch registered");
        Ok(WatchHandle {
            id,
            watch,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Release a watch by id. Returns `true` if it was still registered.
    pub fn unsubscribe(&self, id: WatchId) -> WatchResult<bool> {
        let removed = self.inner.remove(id)?;
        if removed {
            debug!(id = %id, "watch released");
        }
        Ok(removed)
    }

    /// Re-read every watch depending on `touched` and deliver changed
    /// outcomes. Returns the number of events delivered.
    ///
    /// `reread` performs the read for a target; it is called without any
    /// registry lock held. Each re-read is stamped with a generation taken
    /// before it starts, and a result older than what a watch already holds
    /// is discarded. A failing re-read does not stop the others: every
    /// successful one is applied and delivered, then the first error is
    /// returned.
    pub fn notify<F>(&self, touched: &BTreeSet<IdentityKey>, mut reread: F) -> WatchResult<usize>
    where
        F: FnMut(&WatchTarget) -> WatchResult<Denormalized>,
    {
        if touched.is_empty() {
            return Ok(0);
        }

        let candidates: Vec<Arc<Watch>> = {
            let watches = self.read_watches()?;
            let mut out = Vec::new();
            for watch in watches.values() {
                if lock(&watch.last)?.value.depends_on_any(touched) {
                    out.push(Arc::clone(watch));
                }
            }
            out
        };

        let mut first_error = None;
        let mut reads = Vec::with_capacity(candidates.len());
        for watch in &candidates {
            let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
            match reread(&watch.target) {
                Ok(next) => reads.push((watch, generation, next)),
                Err(e) => {
                    debug!(id = %watch.id, error = %e, "watch re-read failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        let mut pending = Vec::new();
        let mut stale = 0;
        for (watch, generation, next) in reads {
            let mut last = lock(&watch.last)?;
            if last.generation > generation {
                stale += 1;
                continue;
            }
            let changed = last.value.outcome.differs_from(&next.outcome);
            *last = Stamped { value: next, generation };
            if changed {
                pending.push((
                    watch,
                    generation,
                    WatchEvent {
                        id: watch.id,
                        outcome: last.value.outcome.clone(),
                    },
                ));
            }
        }

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (watch, generation, event) in pending {
            if !watch.is_live() {
                continue;
            }
            let mut sink = lock(&watch.sink)?;
            if sink.generation > generation {
                stale += 1;
                continue;
            }
            sink.generation = generation;
            if sink.value.deliver(&event) {
                delivered += 1;
            } else {
                closed.push(watch.id);
            }
        }
        for id in closed {
            self.inner.remove(id)?;
        }

        debug!(
            touched = touched.len(),
            reread = candidates.len(),
            stale,
            delivered,
            "watches notified"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(delivered),
        }
    }

    /// Drop watches whose channel receiver is gone. Returns how many.
    ///
    /// `notify` only notices a closed channel when it has an event for it;
    /// this sweeps the rest, so their roots stop counting as live.
    pub fn prune_closed(&self) -> WatchResult<usize> {
        let mut watches = self.write_watches()?;
        let mut stale = Vec::new();
        for (id, watch) in watches.iter() {
            if lock(&watch.sink)?.value.is_closed() {
                stale.push(*id);
            }
        }
        for id in &stale {
            if let Some(watch) = watches.remove(id) {
                watch.active.store(false, Ordering::Release);
            }
        }
        if !stale.is_empty() {
            debug!(pruned = stale.len(), "closed watches pruned");
        }
        Ok(stale.len())
    }

    /// Root keys of every live watch, deduplicated.
    pub fn roots(&self) -> WatchResult<Vec<IdentityKey>> {
        let roots: BTreeSet<IdentityKey> = self
            .read_watches()?
            .values()
            .map(|w| w.target.root.clone())
            .collect();
        Ok(roots.into_iter().collect())
    }

    /// Number of live watches.
    pub fn len(&self) -> usize {
        self.read_watches().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_watches(&self) -> WatchResult<std::sync::RwLockReadGuard<'_, BTreeMap<WatchId, Arc<Watch>>>> {
        self.inner
            .watches
            .read()
            .map_err(|e| WatchError::LockPoisoned(e.to_string()))
    }

    fn write_watches(&self) -> WatchResult<std::sync::RwLockWriteGuard<'_, BTreeMap<WatchId, Arc<Watch>>>> {
        self.inner
            .watches
            .write()
            .map_err(|e| WatchError::LockPoisoned(e.to_string()))
    }
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("watch_count", &self.len())
            .finish()
    }
}

/// Keeps a watch alive; dropping it unsubscribes.
#[must_use = "dropping a WatchHandle releases the watch"]
pub struct WatchHandle {
    id: WatchId,
    watch: Arc<Watch>,
    registry: Weak<RegistryInner>,
}

impl WatchHandle {
    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn target(&self) -> &WatchTarget {
        &self.watch.target
    }

    /// The most recent read, as of the last notification that reached it.
    pub fn current(&self) -> WatchResult<Denormalized> {
        Ok(lock(&self.watch.last)?.value.clone())
    }

    /// Whether the watch is still registered.
    pub fn is_active(&self) -> bool {
        self.watch.is_live()
    }

    /// Release the watch now instead of at drop.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.watch.active.store(false, Ordering::Release);
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id).unwrap_or(false) {
                debug!(id = %self.id, "watch released");
            }
        }
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("root", &self.watch.target.root)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> WatchResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| WatchError::LockPoisoned(e.to_string()))
}
