use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use egc_identity::IdentityResolver;
use egc_normalize::Normalizer;
use egc_read::{Denormalized, ReadOutcome, Reader};
use egc_store::{InMemoryRecordStore, RecordStore};
use egc_types::{IdentityKey, Operation, OperationKind, Record, Schema, SelectionSet, Variables};
use egc_watch::{WatchEvent, WatchHandle, WatchRegistry, WatchSink, WatchTarget};

use crate::config::{CacheConfig, FetchPolicy};
use crate::error::{CacheError, CacheResult};
use crate::executor::QueryExecutor;

/// Normalized entity cache in front of a [`QueryExecutor`].
pub struct EntityCache<E> {
    schema: Schema,
    config: CacheConfig,
    resolver: IdentityResolver,
    executor: E,
    store: Arc<dyn RecordStore>,
    watches: WatchRegistry,
}

impl<E: QueryExecutor> EntityCache<E> {
    /// Create a cache with the default configuration and an empty
    /// in-memory store.
    pub fn new(schema: Schema, executor: E) -> CacheResult<Self> {
        Self::with_config(schema, executor, CacheConfig::default())
    }

    pub fn with_config(schema: Schema, executor: E, config: CacheConfig) -> CacheResult<Self> {
        Self::with_store(schema, executor, config, Arc::new(InMemoryRecordStore::new()))
    }

    /// Create a cache over an existing store.
    pub fn with_store(
        schema: Schema,
        executor: E,
        config: CacheConfig,
        store: Arc<dyn RecordStore>,
    ) -> CacheResult<Self> {
        schema.validate()?;
        let resolver = IdentityResolver::new(config.identity.clone());
        info!(
            types = schema.len(),
            fetch_policy = ?config.fetch_policy,
            composite_rules = config.identity.composite.len(),
            "entity cache created"
        );
        Ok(Self {
            schema,
            config,
            resolver,
            executor,
            store,
            watches: WatchRegistry::new(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn RecordStore {
        &*self.store
    }

    pub fn watches(&self) -> &WatchRegistry {
        &self.watches
    }

    /// Register custom identity functions before first use.
    pub fn resolver_mut(&mut self) -> &mut IdentityResolver {
        &mut self.resolver
    }

    // ---- Operations ----

    /// Run a query under the configured fetch policy.
    pub async fn query(&self, operation: &Operation, variables: &Variables) -> CacheResult<Value> {
        self.query_with_policy(operation, variables, self.config.fetch_policy)
            .await
    }

    pub async fn query_with_policy(
        &self,
        operation: &Operation,
        variables: &Variables,
        policy: FetchPolicy,
    ) -> CacheResult<Value> {
        self.expect_kind(operation, OperationKind::Query)?;
        self.schema.validate_operation(operation)?;

        if policy != FetchPolicy::NetworkOnly {
            let cached = self.read_query(operation, variables)?;
            match cached.outcome {
                ReadOutcome::Complete(tree) => {
                    debug!(operation = operation.label(), ?policy, "served from cache");
                    return Ok(tree);
                }
                ReadOutcome::Miss(missing) if policy == FetchPolicy::CacheOnly => {
                    return Err(CacheError::CacheMiss {
                        operation: operation.label().to_string(),
                        missing,
                    });
                }
                ReadOutcome::Miss(_) => {}
            }
        }

        self.fetch(operation, variables).await
    }

    /// Run a mutation and write its result. Watches see the change before
    /// this returns.
    pub async fn mutate(&self, operation: &Operation, variables: &Variables) -> CacheResult<Value> {
        self.expect_kind(operation, OperationKind::Mutation)?;
        self.schema.validate_operation(operation)?;
        self.fetch(operation, variables).await
    }

    /// Watch a query's selection with a synchronous callback.
    ///
    /// Registration only reads the store; run [`query`](Self::query) to
    /// populate it. The initial read is available from
    /// [`WatchHandle::current`].
    pub fn watch<F>(&self, operation: &Operation, variables: &Variables, callback: F) -> CacheResult<WatchHandle>
    where
        F: FnMut(&WatchEvent) + Send + 'static,
    {
        self.register_watch(operation, variables, WatchSink::callback(callback))
    }

    /// Watch a query's selection through an unbounded channel.
    pub fn watch_channel(
        &self,
        operation: &Operation,
        variables: &Variables,
    ) -> CacheResult<(WatchHandle, mpsc::UnboundedReceiver<WatchEvent>)> {
        let (sink, rx) = WatchSink::channel();
        let handle = self.register_watch(operation, variables, sink)?;
        Ok((handle, rx))
    }

    // ---- Direct store access ----

    /// Read an operation from the store without executing it.
    pub fn read_query(&self, operation: &Operation, variables: &Variables) -> CacheResult<Denormalized> {
        let view = self.store.view()?;
        let read = Reader::new(&self.schema).read_operation(
            &*view,
            self.root_key(operation.kind),
            operation,
            variables,
        )?;
        Ok(read)
    }

    /// Write `data` as if the executor had returned it for `operation`.
    /// Returns the keys that changed.
    pub fn write_query(
        &self,
        operation: &Operation,
        variables: &Variables,
        data: &Value,
    ) -> CacheResult<BTreeSet<IdentityKey>> {
        self.schema.validate_operation(operation)?;
        let normalized = self.normalizer().normalize_operation(
            self.root_key(operation.kind),
            operation,
            variables,
            data,
        )?;
        self.commit(normalized.batch)
    }

    /// Read one entity by key.
    pub fn read_entity(
        &self,
        key: &IdentityKey,
        type_name: &str,
        selection: &SelectionSet,
        variables: &Variables,
    ) -> CacheResult<Denormalized> {
        self.schema.validate_selection(type_name, selection)?;
        let view = self.store.view()?;
        let read = Reader::new(&self.schema).read(&*view, key, type_name, selection, variables)?;
        Ok(read)
    }

    /// Merge `data` into the entity at `key`. Returns the keys that changed.
    pub fn write_entity(
        &self,
        key: &IdentityKey,
        type_name: &str,
        selection: &SelectionSet,
        variables: &Variables,
        data: &Value,
    ) -> CacheResult<BTreeSet<IdentityKey>> {
        self.schema.validate_selection(type_name, selection)?;
        let normalized = self
            .normalizer()
            .normalize_at(key, data, type_name, selection, variables)?;
        self.commit(normalized.batch)
    }

    /// Remove one record. Watches that read it go to a miss.
    pub fn evict(&self, key: &IdentityKey) -> CacheResult<bool> {
        let removed = self.store.evict(key)?;
        if removed {
            self.broadcast(&BTreeSet::from([key.clone()]))?;
        }
        Ok(removed)
    }

    /// Remove records unreachable from the operation roots and every live
    /// watch. Returns the removed keys.
    pub fn gc(&self) -> CacheResult<Vec<IdentityKey>> {
        self.watches.prune_closed()?;
        let mut roots = vec![
            self.config.root_query_key.clone(),
            self.config.root_mutation_key.clone(),
        ];
        roots.extend(self.watches.roots()?);
        let evicted = self.store.retain_reachable(&roots)?;
        info!(roots = roots.len(), evicted = evicted.len(), "cache collected");
        if !evicted.is_empty() {
            self.broadcast(&evicted.iter().cloned().collect())?;
        }
        Ok(evicted)
    }

    /// Remove every record.
    pub fn clear(&self) -> CacheResult<()> {
        let keys: BTreeSet<IdentityKey> = self.store.keys()?.into_iter().collect();
        self.store.clear()?;
        self.broadcast(&keys)?;
        Ok(())
    }

    /// Sorted copy of every record.
    pub fn extract(&self) -> CacheResult<BTreeMap<IdentityKey, Record>> {
        Ok(self.store.extract()?)
    }

    // ---- Internals ----

    async fn fetch(&self, operation: &Operation, variables: &Variables) -> CacheResult<Value> {
        debug!(operation = operation.label(), kind = %operation.kind, "executing");
        let data = self
            .executor
            .execute(operation, variables)
            .await
            .map_err(CacheError::Execution)?;

        // No await past this point: a call cancelled above has written nothing.
        let root = self.root_key(operation.kind);
        let normalized = self
            .normalizer()
            .normalize_operation(root, operation, variables, &data)?;
        self.commit(normalized.batch)?;

        let read = self.read_query(operation, variables)?;
        match read.outcome {
            ReadOutcome::Complete(tree) => Ok(tree),
            ReadOutcome::Miss(missing) => Err(CacheError::IncompleteResponse {
                operation: operation.label().to_string(),
                missing,
            }),
        }
    }

    fn commit(&self, batch: egc_store::WriteBatch) -> CacheResult<BTreeSet<IdentityKey>> {
        let touched = self.store.write(batch)?;
        self.broadcast(&touched)?;
        Ok(touched)
    }

    fn broadcast(&self, touched: &BTreeSet<IdentityKey>) -> CacheResult<usize> {
        let reader = Reader::new(&self.schema);
        let store = &self.store;
        let fired = self.watches.notify(touched, |target| {
            let view = store.view()?;
            Ok(reader.read(
                &*view,
                &target.root,
                &target.type_name,
                &target.selection,
                &target.variables,
            )?)
        })?;
        Ok(fired)
    }

    fn register_watch(
        &self,
        operation: &Operation,
        variables: &Variables,
        sink: WatchSink,
    ) -> CacheResult<WatchHandle> {
        self.expect_kind(operation, OperationKind::Query)?;
        self.schema.validate_operation(operation)?;
        let descriptor = self.schema.root_type(operation.kind)?;
        let target = WatchTarget {
            root: self.config.root_query_key.clone(),
            type_name: descriptor.name.clone(),
            selection: operation.selection.clone(),
            variables: variables.clone(),
        };

        // Registering while the view is held means no write can slip in
        // between the initial read and the watch going live.
        let view = self.store.view()?;
        let initial = Reader::new(&self.schema).read(
            &*view,
            &target.root,
            &target.type_name,
            &target.selection,
            &target.variables,
        )?;
        let handle = self.watches.register(target, initial, sink)?;
        drop(view);
        Ok(handle)
    }

    fn normalizer(&self) -> Normalizer<'_> {
        Normalizer::new(&self.schema, &self.resolver)
    }

    fn root_key(&self, kind: OperationKind) -> &IdentityKey {
        match kind {
            OperationKind::Query => &self.config.root_query_key,
            OperationKind::Mutation => &self.config.root_mutation_key,
        }
    }

    fn expect_kind(&self, operation: &Operation, kind: OperationKind) -> CacheResult<()> {
        if operation.kind != kind {
            return Err(CacheError::InvalidOperation(format!(
                "{} is a {}, expected a {kind}",
                operation.label(),
                operation.kind
            )));
        }
        Ok(())
    }
}

impl<E> fmt::Debug for EntityCache<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCache")
            .field("types", &self.schema.len())
            .field("config", &self.config)
            .field("watches", &self.watches)
            .finish()
    }
}
