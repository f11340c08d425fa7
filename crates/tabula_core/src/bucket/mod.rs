//! The embedded bucket backend.
//!
//! A [`Db`] wraps one [`KvStore`]. Each table is a bucket of the store:
//! JSON records under 8-byte big-endian identifier keys, with the counter
//! cell at key `0` (see [`keys`]).

pub mod allocator;
pub mod keys;
mod table;

pub use table::Bucket;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::manager::CacheRegistry;
use crate::model::{BackendKind, Database, Model, RecordId};
use keys::{decode_key, encode_key, first_record_key, COUNTER_ID};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabula_storage::{
    FileBackend, InMemoryBackend, KvStore, StorageBackend, StorageError, StoreStats,
};
use tracing::info;

struct DbInner {
    store: KvStore,
    path: Option<PathBuf>,
    caches: CacheRegistry,
}

/// Handle to an embedded bucket database.
///
/// Cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

impl Db {
    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file is missing and
    /// `create_if_missing` is off, is locked by another handle, or holds a
    /// damaged log.
    pub fn open(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let path = path.as_ref();
        let backend = if config.create_if_missing {
            FileBackend::open_with_create_dirs(path)?
        } else if path.exists() {
            FileBackend::open(path)?
        } else {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("database file {} does not exist", path.display()),
            ))
            .into());
        };
        let store = KvStore::open(Box::new(backend), config.store_options())?;
        info!(path = %path.display(), "opened bucket database");
        Ok(Self::from_store(store, Some(path.to_path_buf())))
    }

    /// Opens a database that lives only in memory.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`Db::open`].
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), &Config::default())
    }

    /// Opens a database over any storage backend.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend's log is damaged.
    pub fn open_with_backend(backend: Box<dyn StorageBackend>, config: &Config) -> CoreResult<Self> {
        let store = KvStore::open(backend, config.store_options())?;
        Ok(Self::from_store(store, None))
    }

    fn from_store(store: KvStore, path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DbInner {
                store,
                path,
                caches: CacheRegistry::new(),
            }),
        }
    }

    pub(crate) fn store(&self) -> &KvStore {
        &self.inner.store
    }

    /// Path of the database file, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Opens a typed table, creating its bucket if missing.
    ///
    /// Tables opened on clones of this handle under the same name and
    /// model type share one cache.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the bucket cannot be created.
    pub fn bucket<M: Model>(&self, name: &str, prototype: M) -> CoreResult<Bucket<M>> {
        let raw = self.raw(name)?;
        let cache = self.inner.caches.cache_for::<M>(name);
        Ok(Bucket::new(raw, prototype, cache))
    }

    /// Opens an untyped view of a bucket, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the bucket cannot be created.
    pub fn raw(&self, name: &str) -> CoreResult<RawBucket> {
        self.store()
            .update(|tx| tx.create_bucket_if_missing(name))?;
        Ok(RawBucket {
            db: self.clone(),
            name: name.to_string(),
        })
    }

    /// Opens an untyped view of an existing bucket.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if there is no such bucket.
    pub fn existing(&self, name: &str) -> CoreResult<RawBucket> {
        if !self.store().view(|tx| Ok::<_, StorageError>(tx.contains_bucket(name)))? {
            return Err(CoreError::not_found(name, "bucket"));
        }
        Ok(RawBucket {
            db: self.clone(),
            name: name.to_string(),
        })
    }

    /// Names of every bucket in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Closed`] after [`Db::close`].
    pub fn bucket_names(&self) -> CoreResult<Vec<String>> {
        Ok(self.store().bucket_names()?)
    }

    /// Store statistics.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store is closed.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        Ok(self.store().stats()?)
    }

    /// Rewrites the log to hold only live data. Returns bytes reclaimed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the rewrite fails.
    pub fn compact(&self) -> CoreResult<u64> {
        Ok(self.store().compact()?)
    }

    /// Syncs and closes the database. Every clone of the handle is closed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the final sync fails.
    pub fn close(&self) -> CoreResult<()> {
        Ok(self.store().close()?)
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("path", &self.inner.path)
            .field("store", &self.inner.store)
            .finish()
    }
}

impl Database for Db {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Bucket
    }

    fn fetch_raw(&self, table: &str, id: &RecordId) -> CoreResult<String> {
        let seq = id.as_seq().ok_or_else(|| CoreError::InvalidId {
            table: table.to_string(),
            id: id.to_string(),
            expected: "sequential",
        })?;
        self.existing(table)?.get_raw(seq)
    }
}

/// Untyped access to one bucket: serialized records by identifier.
#[derive(Debug, Clone)]
pub struct RawBucket {
    db: Db,
    name: String,
}

impl RawBucket {
    /// Name of the bucket.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database this bucket lives in.
    #[must_use]
    pub fn db(&self) -> &Db {
        &self.db
    }

    fn decode(&self, id: u64, bytes: Vec<u8>) -> CoreResult<String> {
        String::from_utf8(bytes).map_err(|e| CoreError::InvalidRecord {
            table: self.name.clone(),
            id: id.to_string(),
            message: e.to_string(),
        })
    }

    /// Serialized record under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if absent.
    pub fn get_raw(&self, id: u64) -> CoreResult<String> {
        let bytes = self
            .db
            .store()
            .view(|tx| tx.get(&self.name, &encode_key(id)))?
            .ok_or_else(|| CoreError::not_found(&self.name, id))?;
        self.decode(id, bytes)
    }

    /// Stores `raw` under `id`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn set_raw(&self, id: u64, raw: &str) -> CoreResult<()> {
        Ok(self
            .db
            .store()
            .update(|tx| tx.put(&self.name, &encode_key(id), raw.as_bytes()))?)
    }

    /// Removes the entry under `id`. Absent entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidId`] for the counter cell, or a storage
    /// error.
    pub fn delete(&self, id: u64) -> CoreResult<()> {
        if id == COUNTER_ID {
            return Err(CoreError::InvalidId {
                table: self.name.clone(),
                id: id.to_string(),
                expected: "non-zero",
            });
        }
        Ok(self
            .db
            .store()
            .update(|tx| tx.delete(&self.name, &encode_key(id)))?)
    }

    /// Removes every entry, including the counter cell.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn clear(&self) -> CoreResult<()> {
        Ok(self.db.store().update(|tx| tx.clear_bucket(&self.name))?)
    }

    /// Every record in ascending identifier order, counter cell excluded.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or [`CoreError::InvalidRecord`] for entries
    /// that are not identifier-keyed text.
    pub fn scan(&self) -> CoreResult<Vec<(u64, String)>> {
        let entries = self
            .db
            .store()
            .view(|tx| tx.scan_from(&self.name, &first_record_key()))?;
        entries
            .into_iter()
            .map(|(key, value)| {
                let id = decode_key(&key).ok_or_else(|| CoreError::InvalidRecord {
                    table: self.name.clone(),
                    id: format!("{key:?}"),
                    message: "key is not an 8-byte identifier".to_string(),
                })?;
                Ok((id, self.decode(id, value)?))
            })
            .collect()
    }

    /// Number of records, counter cell excluded.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn count(&self) -> CoreResult<u64> {
        let (len, has_counter) = self.db.store().view(|tx| {
            let len = tx.len(&self.name)?;
            let counter = tx.get(&self.name, &encode_key(COUNTER_ID))?;
            Ok::<_, StorageError>((len, counter.is_some()))
        })?;
        Ok((len - usize::from(has_counter)) as u64)
    }

    /// The identifier the next new record would receive.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRecord`] if the counter is unreadable.
    pub fn next_id(&self) -> CoreResult<u64> {
        self.db
            .store()
            .view(|tx| allocator::peek(tx, &self.name))
    }
}
