//! Object cache and filter engine in front of a table.
//!
//! Every table holds a [`Cache`]. A [`Manager`] is a short-lived view that
//! pairs the table with its cache:
//!
//! - **pass-through** (initial): reads go to the backend and every record
//!   returned is cached on the way out
//! - **instance**: `all` and `filter` are answered from memory only
//!
//! [`Manager::seed`] and [`Manager::preload`] switch to instance mode,
//! [`Manager::clear`] switches back and drops all entries.
//!
//! Entries are never evicted on their own; the cache grows with the number
//! of distinct records it has seen.
//!
//! Caches are shared per database handle through a [`CacheRegistry`]: every
//! table opened on the same handle under the same name and model type works
//! with the same cache, so a delete through one table evicts the record for
//! all of them.
//!
//! The cache mutex is never held across a backend call, so a sequence like
//! "get, modify, store" is not atomic with respect to other threads sharing
//! the table.

use crate::error::{CoreError, CoreResult};
use crate::model::{Model, RecordId};
use crate::params::Filter;
use crate::table::Table;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// The cache's current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Reads go to the backend; results warm the cache.
    PassThrough,
    /// Reads are answered from the cache.
    Instance,
}

#[derive(Debug)]
enum CacheState<M> {
    PassThrough(BTreeMap<RecordId, M>),
    Instance(BTreeMap<RecordId, M>),
}

impl<M> CacheState<M> {
    fn entries(&self) -> &BTreeMap<RecordId, M> {
        match self {
            Self::PassThrough(e) | Self::Instance(e) => e,
        }
    }

    fn entries_mut(&mut self) -> &mut BTreeMap<RecordId, M> {
        match self {
            Self::PassThrough(e) | Self::Instance(e) => e,
        }
    }

    fn mode(&self) -> CacheMode {
        match self {
            Self::PassThrough(_) => CacheMode::PassThrough,
            Self::Instance(_) => CacheMode::Instance,
        }
    }
}

/// Records cached by identifier, scoped to one table.
#[derive(Debug)]
pub struct Cache<M> {
    state: Mutex<CacheState<M>>,
}

impl<M> Default for Cache<M> {
    fn default() -> Self {
        Self {
            state: Mutex::new(CacheState::PassThrough(BTreeMap::new())),
        }
    }
}

impl<M: Model> Cache<M> {
    /// Creates an empty pass-through cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> CacheMode {
        self.state.lock().mode()
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the cached record.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<M> {
        self.state.lock().entries().get(id).cloned()
    }

    /// Inserts or overwrites the entry for `model`. Records without an
    /// identifier are not cached.
    pub fn insert(&self, model: M) {
        let id = model.id();
        if id.is_unset() {
            debug!("skipping cache insert of record without identifier");
            return;
        }
        self.state.lock().entries_mut().insert(id, model);
    }

    /// Refreshes the cache after a successful save.
    ///
    /// In instance mode the record is inserted; in pass-through mode an
    /// existing entry is overwritten and a missing one is left missing.
    pub fn record_saved(&self, model: &M) {
        let id = model.id();
        let mut state = self.state.lock();
        match &mut *state {
            CacheState::Instance(entries) => {
                entries.insert(id, model.clone());
            }
            CacheState::PassThrough(entries) => {
                if let Some(slot) = entries.get_mut(&id) {
                    *slot = model.clone();
                }
            }
        }
    }

    /// Removes one entry. Returns true if it was cached.
    pub fn evict(&self, id: &RecordId) -> bool {
        self.state.lock().entries_mut().remove(id).is_some()
    }

    /// Drops every entry, keeping the mode.
    pub fn clear_entries(&self) {
        self.state.lock().entries_mut().clear();
    }

    /// Cached records in identifier order.
    #[must_use]
    pub fn values(&self) -> Vec<M> {
        self.state.lock().entries().values().cloned().collect()
    }

    /// Adds `models` and switches to instance mode. Entries already cached
    /// are kept.
    pub fn seed(&self, models: impl IntoIterator<Item = M>) {
        let mut state = self.state.lock();
        let mut entries = std::mem::take(state.entries_mut());
        for model in models {
            let id = model.id();
            if !id.is_unset() {
                entries.insert(id, model);
            }
        }
        debug!(entries = entries.len(), "cache entering instance mode");
        *state = CacheState::Instance(entries);
    }

    /// Drops every entry and returns to pass-through mode.
    pub fn reset(&self) {
        *self.state.lock() = CacheState::PassThrough(BTreeMap::new());
        debug!("cache reset to pass-through mode");
    }
}

type SharedCache = Arc<dyn Any + Send + Sync>;

/// Caches of one database handle, keyed by table name and model type.
#[derive(Default)]
pub struct CacheRegistry {
    caches: Mutex<HashMap<(String, TypeId), SharedCache>>,
}

impl CacheRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache for table `name` holding `M` records, created on first use.
    pub fn cache_for<M: Model>(&self, name: &str) -> Arc<Cache<M>> {
        let mut caches = self.caches.lock();
        let slot = caches
            .entry((name.to_string(), TypeId::of::<M>()))
            .or_insert_with(|| {
                debug!(table = name, "registering table cache");
                Arc::new(Cache::<M>::new())
            });
        match Arc::clone(slot).downcast::<Cache<M>>() {
            Ok(cache) => cache,
            // The key carries M's TypeId, so the stored cache is always a Cache<M>.
            Err(_) => {
                let cache = Arc::new(Cache::<M>::new());
                *slot = cache.clone();
                cache
            }
        }
    }

    /// Number of registered caches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.caches.lock().len()
    }

    /// Returns true if no cache has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.len())
            .finish()
    }
}

/// A cache-backed view over a table.
///
/// Obtained from [`Table::manager`]. Backend failures propagate and leave
/// the cache untouched.
pub struct Manager<'t, M: Model, T: Table<M> + ?Sized> {
    table: &'t T,
    _model: PhantomData<fn() -> M>,
}

impl<'t, M: Model, T: Table<M> + ?Sized> Manager<'t, M, T> {
    /// Creates a manager over `table`.
    pub fn new(table: &'t T) -> Self {
        Self {
            table,
            _model: PhantomData,
        }
    }

    fn cache(&self) -> &'t Cache<M> {
        self.table.cache()
    }

    /// The underlying table.
    #[must_use]
    pub fn table(&self) -> &'t T {
        self.table
    }

    /// Every record.
    ///
    /// # Errors
    ///
    /// In pass-through mode, returns the backend's error.
    pub fn all(&self) -> CoreResult<Vec<M>> {
        if self.is_instance() {
            return Ok(self.cache().values());
        }
        let models = self.table.all()?;
        self.warm(&models);
        Ok(models)
    }

    /// Records passing `filter`.
    ///
    /// # Errors
    ///
    /// Returns a lookup error for unknown fields, or in pass-through mode the
    /// backend's error (including unsupported filter shapes).
    pub fn filter(&self, filter: &Filter) -> CoreResult<Vec<M>> {
        if self.is_instance() {
            let mut matched = Vec::new();
            for model in self.cache().values() {
                if filter.matches(&model)? {
                    matched.push(model);
                }
            }
            return Ok(matched);
        }
        let models = self.table.filter(filter)?;
        self.warm(&models);
        Ok(models)
    }

    /// One record, from the cache if present, otherwise from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if neither has it.
    pub fn get(&self, id: &RecordId) -> CoreResult<M> {
        if let Some(model) = self.cache().get(id) {
            return Ok(model);
        }
        let model = self.table.get(id)?;
        self.cache().insert(model.clone());
        Ok(model)
    }

    /// Inserts or overwrites the cached entry for `model`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidId`] if the record has no identifier.
    pub fn store(&self, model: M) -> CoreResult<()> {
        let id = model.id();
        if id.is_unset() {
            return Err(CoreError::InvalidId {
                table: self.table.name().to_string(),
                id: id.to_string(),
                expected: "assigned",
            });
        }
        self.cache().insert(model);
        Ok(())
    }

    /// Caches `models` and switches to instance mode.
    pub fn seed(&self, models: impl IntoIterator<Item = M>) {
        self.cache().seed(models);
    }

    /// Loads every record from the backend and switches to instance mode.
    /// Returns the number of records loaded.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the cache is left as it was.
    pub fn preload(&self) -> CoreResult<usize> {
        let models = self.table.all()?;
        let loaded = models.len();
        self.cache().seed(models);
        debug!(table = self.table.name(), loaded, "preloaded table cache");
        Ok(loaded)
    }

    /// Drops every cached record and returns to pass-through mode.
    pub fn clear(&self) {
        self.cache().reset();
    }

    /// Removes one cached record. Returns true if it was cached.
    pub fn evict(&self, id: &RecordId) -> bool {
        self.cache().evict(id)
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache().is_empty()
    }

    /// Current cache mode.
    #[must_use]
    pub fn mode(&self) -> CacheMode {
        self.cache().mode()
    }

    /// Returns true in instance mode.
    #[must_use]
    pub fn is_instance(&self) -> bool {
        self.mode() == CacheMode::Instance
    }

    fn warm(&self, models: &[M]) {
        for model in models {
            self.cache().insert(model.clone());
        }
    }
}
