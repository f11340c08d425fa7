//! Sequential identifier allocation.
//!
//! The allocator reads the counter cell, hands out its value and writes back
//! the value plus one, all inside the caller's write transaction. Because the
//! store admits one write transaction at a time, concurrent saves never see
//! the same counter value.

use super::keys::{decode_counter, encode_counter, encode_key, COUNTER_ID};
use crate::error::{CoreError, CoreResult};
use tabula_storage::{ReadTxn, WriteTxn};
use tracing::debug;

fn parse(bucket: &str, raw: Option<Vec<u8>>) -> CoreResult<u64> {
    match raw {
        None => Ok(1),
        Some(bytes) => match decode_counter(&bytes) {
            Some(0) => Ok(1),
            Some(next) => Ok(next),
            None => Err(CoreError::InvalidRecord {
                table: bucket.to_string(),
                id: COUNTER_ID.to_string(),
                message: format!("counter is not a number: {:?}", String::from_utf8_lossy(&bytes)),
            }),
        },
    }
}

/// Allocates the next identifier of `bucket`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidRecord`] if the counter cell is unreadable, or
/// a storage error.
pub fn allocate(tx: &mut WriteTxn<'_>, bucket: &str) -> CoreResult<u64> {
    let key = encode_key(COUNTER_ID);
    let id = parse(bucket, tx.get(bucket, &key)?)?;
    let next = id.checked_add(1).ok_or_else(|| CoreError::InvalidRecord {
        table: bucket.to_string(),
        id: COUNTER_ID.to_string(),
        message: "identifier space exhausted".to_string(),
    })?;
    tx.put(bucket, &key, &encode_counter(next))?;
    debug!(bucket, id, "allocated identifier");
    Ok(id)
}

/// The identifier the next allocation in `bucket` would return.
///
/// # Errors
///
/// Same as [`allocate`].
pub fn peek(tx: &ReadTxn<'_>, bucket: &str) -> CoreResult<u64> {
    parse(bucket, tx.get(bucket, &encode_key(COUNTER_ID))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_storage::{InMemoryBackend, KvStore, StoreOptions};

    fn store() -> KvStore {
        let store = KvStore::open(Box::new(InMemoryBackend::new()), StoreOptions::default()).unwrap();
        store
            .update(|tx| tx.create_bucket_if_missing("b").map(|_| ()))
            .unwrap();
        store
    }

    #[test]
    fn seeds_at_one_and_counts_up() {
        let store = store();
        let ids: Vec<u64> = (0..3)
            .map(|_| store.update(|tx| allocate(tx, "b")).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.view(|tx| peek(tx, "b")).unwrap(), 4);
    }

    #[test]
    fn zero_counter_restarts_at_one() {
        let store = store();
        store
            .update(|tx| tx.put("b", &encode_key(COUNTER_ID), b"0"))
            .unwrap();
        assert_eq!(store.update(|tx| allocate(tx, "b")).unwrap(), 1);
    }

    #[test]
    fn garbage_counter_is_reported() {
        let store = store();
        store
            .update(|tx| tx.put("b", &encode_key(COUNTER_ID), b"abc"))
            .unwrap();
        let err = store.update(|tx| allocate(tx, "b")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord { .. }));
    }

    #[test]
    fn allocation_inside_failed_txn_is_rolled_back() {
        let store = store();
        let result: CoreResult<()> = store.update(|tx| {
            allocate(tx, "b")?;
            Err(CoreError::not_found("b", 1))
        });
        assert!(result.is_err());
        assert_eq!(store.view(|tx| peek(tx, "b")).unwrap(), 1);
    }
}
