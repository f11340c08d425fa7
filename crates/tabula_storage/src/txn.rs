//! Read and write transactions over the bucket map.

use crate::error::{StorageError, StorageResult};
use crate::record::{LogRecord, MAX_BUCKET_NAME, MAX_PAYLOAD};
use crate::store::{Buckets, KvStore};
use parking_lot::RwLockReadGuard;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Committed ordered contents of one bucket.
pub(crate) type BucketMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// A read-only view of the committed state.
///
/// Holds a shared lock on the in-memory state for its whole lifetime, so every
/// read inside one `view` call sees the same snapshot.
pub struct ReadTxn<'a> {
    state: RwLockReadGuard<'a, Buckets>,
}

impl<'a> ReadTxn<'a> {
    pub(crate) fn new(state: RwLockReadGuard<'a, Buckets>) -> Self {
        Self { state }
    }

    fn bucket(&self, name: &str) -> StorageResult<&BucketMap> {
        self.state
            .get(name)
            .ok_or_else(|| StorageError::bucket_not_found(name))
    }

    /// Returns true if the bucket exists.
    #[must_use]
    pub fn contains_bucket(&self, name: &str) -> bool {
        self.state.contains_key(name)
    }

    /// Returns all bucket names in sorted order.
    #[must_use]
    pub fn bucket_names(&self) -> Vec<String> {
        self.state.keys().cloned().collect()
    }

    /// Gets the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn get(&self, bucket: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.bucket(bucket)?.get(key).cloned())
    }

    /// Returns every entry in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn scan(&self, bucket: &str) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .bucket(bucket)?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Returns entries whose key is `>= start`, in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn scan_from(&self, bucket: &str, start: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .bucket(bucket)?
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Returns the number of entries in the bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn len(&self, bucket: &str) -> StorageResult<usize> {
        Ok(self.bucket(bucket)?.len())
    }
}

/// Where a bucket's pending view starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    /// Pending writes overlay the committed contents.
    Committed,
    /// The bucket was (re)created or cleared inside this transaction.
    Empty,
    /// The bucket was dropped inside this transaction.
    Dropped,
}

#[derive(Debug)]
struct PendingBucket {
    base: Base,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl PendingBucket {
    fn reset(base: Base) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
        }
    }
}

/// A write transaction.
///
/// Only one exists at a time per store: it is created while the store's
/// writer lock is held and lives inside [`KvStore::update`]. Reads observe the
/// committed state overlaid with this transaction's own pending writes.
/// Nothing reaches the log until the closure returns `Ok`.
pub struct WriteTxn<'a> {
    store: &'a KvStore,
    pending: BTreeMap<String, PendingBucket>,
    records: Vec<LogRecord>,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(store: &'a KvStore) -> Self {
        Self {
            store,
            pending: BTreeMap::new(),
            records: Vec::new(),
        }
    }

    pub(crate) fn into_records(self) -> Vec<LogRecord> {
        self.records
    }

    /// Returns true if the bucket exists from this transaction's point of view.
    #[must_use]
    pub fn contains_bucket(&self, name: &str) -> bool {
        match self.pending.get(name).map(|p| p.base) {
            Some(Base::Dropped) => false,
            Some(Base::Empty) => true,
            Some(Base::Committed) | None => self.store.state().contains_key(name),
        }
    }

    fn require(&self, name: &str) -> StorageResult<()> {
        if self.contains_bucket(name) {
            Ok(())
        } else {
            Err(StorageError::bucket_not_found(name))
        }
    }

    fn pending_mut(&mut self, name: &str) -> &mut PendingBucket {
        self.pending
            .entry(name.to_string())
            .or_insert_with(|| PendingBucket::reset(Base::Committed))
    }

    /// Creates the bucket unless it already exists. Returns true if created.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TooLarge`] if the name cannot be encoded.
    pub fn create_bucket_if_missing(&mut self, name: &str) -> StorageResult<bool> {
        if self.contains_bucket(name) {
            return Ok(false);
        }
        if name.len() > MAX_BUCKET_NAME {
            return Err(StorageError::TooLarge {
                what: "bucket name",
                size: name.len(),
                max: MAX_BUCKET_NAME,
            });
        }
        self.pending
            .insert(name.to_string(), PendingBucket::reset(Base::Empty));
        self.records.push(LogRecord::CreateBucket {
            bucket: name.to_string(),
        });
        Ok(true)
    }

    /// Inserts or overwrites `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist,
    /// or [`StorageError::TooLarge`] for an unencodable key or value.
    pub fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.require(bucket)?;
        for (what, bytes) in [("key", key), ("value", value)] {
            if bytes.len() > MAX_PAYLOAD {
                return Err(StorageError::TooLarge {
                    what,
                    size: bytes.len(),
                    max: MAX_PAYLOAD,
                });
            }
        }
        self.pending_mut(bucket)
            .writes
            .insert(key.to_vec(), Some(value.to_vec()));
        self.records.push(LogRecord::Put {
            bucket: bucket.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn delete(&mut self, bucket: &str, key: &[u8]) -> StorageResult<()> {
        self.require(bucket)?;
        self.pending_mut(bucket).writes.insert(key.to_vec(), None);
        self.records.push(LogRecord::Delete {
            bucket: bucket.to_string(),
            key: key.to_vec(),
        });
        Ok(())
    }

    /// Removes every key of the bucket, keeping the bucket itself.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn clear_bucket(&mut self, bucket: &str) -> StorageResult<()> {
        self.require(bucket)?;
        self.pending
            .insert(bucket.to_string(), PendingBucket::reset(Base::Empty));
        self.records.push(LogRecord::ClearBucket {
            bucket: bucket.to_string(),
        });
        Ok(())
    }

    /// Removes the bucket and all of its keys.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn drop_bucket(&mut self, bucket: &str) -> StorageResult<()> {
        self.require(bucket)?;
        self.pending
            .insert(bucket.to_string(), PendingBucket::reset(Base::Dropped));
        self.records.push(LogRecord::DropBucket {
            bucket: bucket.to_string(),
        });
        Ok(())
    }

    /// Gets the value under `key`, seeing this transaction's own writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn get(&self, bucket: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.require(bucket)?;
        let base = match self.pending.get(bucket) {
            Some(pending) => {
                if let Some(write) = pending.writes.get(key) {
                    return Ok(write.clone());
                }
                pending.base
            }
            None => Base::Committed,
        };
        match base {
            Base::Committed => Ok(self
                .store
                .state()
                .get(bucket)
                .and_then(|b| b.get(key).cloned())),
            Base::Empty | Base::Dropped => Ok(None),
        }
    }

    /// Returns every entry in ascending key order, including pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn scan(&self, bucket: &str) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self.merged(bucket)?.into_iter().collect())
    }

    /// Returns entries whose key is `>= start`, including pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn scan_from(&self, bucket: &str, start: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .merged(bucket)?
            .into_iter()
            .filter(|(k, _)| k.as_slice() >= start)
            .collect())
    }

    /// Returns the number of entries, including pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn len(&self, bucket: &str) -> StorageResult<usize> {
        Ok(self.merged(bucket)?.len())
    }

    fn merged(&self, bucket: &str) -> StorageResult<BucketMap> {
        self.require(bucket)?;
        let pending = self.pending.get(bucket);
        let mut view = match pending.map(|p| p.base) {
            Some(Base::Empty) | Some(Base::Dropped) => BucketMap::new(),
            Some(Base::Committed) | None => self
                .store
                .state()
                .get(bucket)
                .cloned()
                .unwrap_or_default(),
        };
        if let Some(pending) = pending {
            for (key, write) in &pending.writes {
                match write {
                    Some(value) => {
                        view.insert(key.clone(), value.clone());
                    }
                    None => {
                        view.remove(key);
                    }
                }
            }
        }
        Ok(view)
    }
}
