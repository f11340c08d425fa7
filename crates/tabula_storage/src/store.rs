//! The ordered key/value store.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::record::{Decoded, LogRecord};
use crate::txn::{BucketMap, ReadTxn, WriteTxn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// All committed buckets by name.
pub(crate) type Buckets = BTreeMap<String, BucketMap>;

/// Options for opening a [`KvStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Sync the backend after every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
        }
    }
}

/// Summary numbers for a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of buckets.
    pub buckets: usize,
    /// Number of live entries across all buckets.
    pub entries: usize,
    /// Size of the log in bytes.
    pub log_size: u64,
    /// Last committed transaction id.
    pub last_txid: u64,
}

/// An embedded, ordered key/value store with named buckets.
///
/// State lives in memory as one ordered map per bucket; every committed
/// transaction is appended to a log on a [`StorageBackend`] and replayed on
/// open.
///
/// ## Concurrency
///
/// - Single writer: [`KvStore::update`] holds the writer lock for the whole
///   closure, so read-modify-write sequences inside one update are atomic
///   with respect to other updates.
/// - Readers never block each other and see committed state only.
/// - Calling `update` from inside another `update` on the same store
///   deadlocks; calling `view` inside `update` is fine.
///
/// ## Recovery
///
/// Only batches terminated by a `Commit` record are applied. A torn tail
/// (partial record or a batch without its commit) is cut off. Checksum
/// mismatches and unknown records abort the open.
pub struct KvStore {
    backend: Mutex<Box<dyn StorageBackend>>,
    state: RwLock<Buckets>,
    next_txid: AtomicU64,
    options: StoreOptions,
    closed: AtomicBool,
}

impl KvStore {
    /// Opens a store over `backend`, replaying its log.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the log is damaged, or an I/O error if
    /// it cannot be read or a torn tail cannot be truncated.
    pub fn open(mut backend: Box<dyn StorageBackend>, options: StoreOptions) -> StorageResult<Self> {
        let bytes = backend.read_all()?;
        let mut state = Buckets::new();
        let mut batch = Vec::new();
        let mut offset = 0usize;
        let mut committed_end = 0usize;
        let mut last_txid = 0u64;
        let mut batches = 0usize;

        while let Decoded::Record(record, next) = LogRecord::decode_at(&bytes, offset)? {
            offset = next;
            match record {
                LogRecord::Commit { txid } => {
                    for pending in batch.drain(..) {
                        apply(&mut state, pending);
                    }
                    last_txid = last_txid.max(txid);
                    committed_end = offset;
                    batches += 1;
                }
                other => batch.push(other),
            }
        }

        if committed_end < bytes.len() {
            warn!(
                discarded = bytes.len() - committed_end,
                uncommitted_records = batch.len(),
                "truncating torn tail of store log"
            );
            backend.truncate(committed_end as u64)?;
        }

        info!(
            buckets = state.len(),
            batches,
            log_size = committed_end,
            "opened key/value store"
        );

        Ok(Self {
            backend: Mutex::new(backend),
            state: RwLock::new(state),
            next_txid: AtomicU64::new(last_txid + 1),
            options,
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn state(&self) -> RwLockReadGuard<'_, Buckets> {
        self.state.read()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    /// Runs `f` against a consistent snapshot of committed state.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Closed`] after [`KvStore::close`], or whatever
    /// `f` returns.
    pub fn view<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTxn<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        self.ensure_open()?;
        let txn = ReadTxn::new(self.state.read());
        f(&txn)
    }

    /// Runs `f` inside a write transaction and commits it if `f` succeeds.
    ///
    /// If `f` returns `Err`, nothing is written. If it returns `Ok` the batch
    /// is appended to the log (followed by a commit marker), synced when
    /// configured, and then published to readers.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a storage error if the commit fails;
    /// a failed commit leaves the committed state unchanged.
    pub fn update<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        self.ensure_open()?;
        let mut backend = self.backend.lock();
        let mut txn = WriteTxn::new(self);
        let value = f(&mut txn)?;
        let records = txn.into_records();
        if records.is_empty() {
            return Ok(value);
        }

        let txid = self.next_txid.fetch_add(1, Ordering::SeqCst);
        self.commit(&mut **backend, records, txid)?;
        Ok(value)
    }

    fn commit(
        &self,
        backend: &mut dyn StorageBackend,
        records: Vec<LogRecord>,
        txid: u64,
    ) -> StorageResult<()> {
        let mut buf = Vec::new();
        for record in &records {
            record.encode_into(&mut buf)?;
        }
        LogRecord::Commit { txid }.encode_into(&mut buf)?;

        let start = backend.size()?;
        let written = backend.append(&buf).and_then(|_| {
            if self.options.sync_on_commit {
                backend.sync()
            } else {
                backend.flush()
            }
        });
        if let Err(err) = written {
            // Best effort: without the commit marker the batch is ignored on
            // replay anyway.
            let _ = backend.truncate(start);
            return Err(err);
        }

        debug!(txid, records = records.len(), bytes = buf.len(), "committed batch");
        let mut state = self.state.write();
        for record in records {
            apply(&mut state, record);
        }
        Ok(())
    }

    /// Returns all bucket names in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Closed`] after [`KvStore::close`].
    pub fn bucket_names(&self) -> StorageResult<Vec<String>> {
        self.view(|tx| Ok(tx.bucket_names()))
    }

    /// Returns summary numbers for the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the log size is unknown.
    pub fn stats(&self) -> StorageResult<StoreStats> {
        self.ensure_open()?;
        let log_size = self.backend.lock().size()?;
        let state = self.state.read();
        Ok(StoreStats {
            buckets: state.len(),
            entries: state.values().map(BTreeMap::len).sum(),
            log_size,
            last_txid: self.next_txid.load(Ordering::SeqCst).saturating_sub(1),
        })
    }

    /// Rewrites the log so it holds only live data, as a single batch.
    ///
    /// Returns the number of bytes reclaimed.
    ///
    /// # Errors
    ///
    /// Returns an error if the new log cannot be encoded or written.
    pub fn compact(&self) -> StorageResult<u64> {
        self.ensure_open()?;
        let mut backend = self.backend.lock();
        let before = backend.size()?;

        let mut buf = Vec::new();
        {
            let state = self.state.read();
            for (name, entries) in state.iter() {
                LogRecord::CreateBucket {
                    bucket: name.clone(),
                }
                .encode_into(&mut buf)?;
                for (key, value) in entries {
                    LogRecord::Put {
                        bucket: name.clone(),
                        key: key.clone(),
                        value: value.clone(),
                    }
                    .encode_into(&mut buf)?;
                }
            }
        }
        let txid = self.next_txid.fetch_add(1, Ordering::SeqCst);
        LogRecord::Commit { txid }.encode_into(&mut buf)?;

        backend.replace(&buf)?;
        let reclaimed = before.saturating_sub(buf.len() as u64);
        info!(before, after = buf.len(), reclaimed, "compacted store log");
        Ok(reclaimed)
    }

    /// Syncs the backend and rejects further operations.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.backend.lock().sync()
    }

    /// Returns true once [`KvStore::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("buckets", &self.state.read().len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn apply(state: &mut Buckets, record: LogRecord) {
    match record {
        LogRecord::CreateBucket { bucket } => {
            state.entry(bucket).or_default();
        }
        LogRecord::Put { bucket, key, value } => {
            state.entry(bucket).or_default().insert(key, value);
        }
        LogRecord::Delete { bucket, key } => {
            if let Some(entries) = state.get_mut(&bucket) {
                entries.remove(&key);
            }
        }
        LogRecord::ClearBucket { bucket } => {
            if let Some(entries) = state.get_mut(&bucket) {
                entries.clear();
            }
        }
        LogRecord::DropBucket { bucket } => {
            state.remove(&bucket);
        }
        LogRecord::Commit { .. } => {}
    }
}
