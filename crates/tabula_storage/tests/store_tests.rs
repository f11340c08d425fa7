//! Integration tests for the key/value store.

use std::sync::Arc;
use std::thread;
use tabula_storage::{
    FileBackend, InMemoryBackend, KvStore, LogRecord, StorageBackend, StorageError,
    StorageResult, StoreOptions,
};
use tempfile::tempdir;

fn open(backend: &InMemoryBackend) -> KvStore {
    KvStore::open(Box::new(backend.share()), StoreOptions::default()).unwrap()
}

fn seed(store: &KvStore, bucket: &str, entries: &[(&[u8], &[u8])]) {
    store
        .update(|tx| {
            tx.create_bucket_if_missing(bucket)?;
            for (k, v) in entries {
                tx.put(bucket, k, v)?;
            }
            Ok::<_, StorageError>(())
        })
        .unwrap();
}

#[test]
fn put_get_delete() {
    let backend = InMemoryBackend::new();
    let store = open(&backend);
    seed(&store, "cars", &[(b"a", b"1"), (b"b", b"2")]);

    assert_eq!(store.view(|tx| tx.get("cars", b"a")).unwrap(), Some(b"1".to_vec()));

    store
        .update(|tx| {
            tx.delete("cars", b"a")?;
            tx.delete("cars", b"missing")
        })
        .unwrap();

    assert_eq!(store.view(|tx| tx.get("cars", b"a")).unwrap(), None);
    assert_eq!(store.view(|tx| tx.len("cars")).unwrap(), 1);
}

#[test]
fn missing_bucket_is_an_error() {
    let store = open(&InMemoryBackend::new());
    let err = store.view(|tx| tx.get("nope", b"k")).unwrap_err();
    assert!(matches!(err, StorageError::BucketNotFound(name) if name == "nope"));

    let err = store
        .update(|tx| tx.put("nope", b"k", b"v"))
        .unwrap_err();
    assert!(matches!(err, StorageError::BucketNotFound(_)));
}

#[test]
fn scans_are_key_ordered() {
    let store = open(&InMemoryBackend::new());
    seed(
        &store,
        "nums",
        &[(&[0, 3], b"c"), (&[0, 1], b"a"), (&[0, 2], b"b"), (&[0, 0], b"counter")],
    );

    let all = store.view(|tx| tx.scan("nums")).unwrap();
    let keys: Vec<_> = all.iter().map(|(k, _)| k[1]).collect();
    assert_eq!(keys, vec![0, 1, 2, 3]);

    let from = store.view(|tx| tx.scan_from("nums", &[0, 1])).unwrap();
    let values: Vec<_> = from.into_iter().map(|(_, v)| v).collect();
    assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn write_txn_reads_its_own_writes() {
    let store = open(&InMemoryBackend::new());
    seed(&store, "b", &[(b"x", b"old"), (b"y", b"keep")]);

    store
        .update(|tx| {
            tx.put("b", b"x", b"new")?;
            tx.delete("b", b"y")?;
            tx.put("b", b"z", b"added")?;

            assert_eq!(tx.get("b", b"x")?, Some(b"new".to_vec()));
            assert_eq!(tx.get("b", b"y")?, None);
            assert_eq!(tx.len("b")?, 2);

            // Other readers still see the committed state.
            let committed = store.view(|r| r.get("b", b"x"))?;
            assert_eq!(committed, Some(b"old".to_vec()));
            Ok::<_, StorageError>(())
        })
        .unwrap();

    assert_eq!(store.view(|tx| tx.get("b", b"x")).unwrap(), Some(b"new".to_vec()));
}

#[test]
fn failed_closure_writes_nothing() {
    let backend = InMemoryBackend::new();
    let store = open(&backend);
    seed(&store, "b", &[(b"k", b"v")]);
    let size_before = backend.size().unwrap();

    let result: StorageResult<()> = store.update(|tx| {
        tx.put("b", b"k", b"changed")?;
        Err(StorageError::corrupted(0, "simulated failure"))
    });
    assert!(result.is_err());

    assert_eq!(backend.size().unwrap(), size_before);
    assert_eq!(store.view(|tx| tx.get("b", b"k")).unwrap(), Some(b"v".to_vec()));
}

#[test]
fn clear_and_drop_bucket() {
    let store = open(&InMemoryBackend::new());
    seed(&store, "b", &[(b"1", b"a"), (b"2", b"b")]);

    store
        .update(|tx| {
            tx.clear_bucket("b")?;
            assert_eq!(tx.len("b")?, 0);
            tx.put("b", b"3", b"c")
        })
        .unwrap();
    assert_eq!(
        store.view(|tx| tx.scan("b")).unwrap(),
        vec![(b"3".to_vec(), b"c".to_vec())]
    );

    store.update(|tx| tx.drop_bucket("b")).unwrap();
    assert!(store.bucket_names().unwrap().is_empty());
}

#[test]
fn reopen_replays_committed_batches() {
    let backend = InMemoryBackend::new();
    {
        let store = open(&backend);
        seed(&store, "cars", &[(b"1", b"tesla")]);
        seed(&store, "users", &[(b"1", b"root")]);
        store.update(|tx| tx.delete("cars", b"1")).unwrap();
        store.close().unwrap();
    }

    let store = open(&backend);
    assert_eq!(store.bucket_names().unwrap(), vec!["cars", "users"]);
    assert_eq!(store.view(|tx| tx.len("cars")).unwrap(), 0);
    assert_eq!(store.view(|tx| tx.get("users", b"1")).unwrap(), Some(b"root".to_vec()));
    assert_eq!(store.stats().unwrap().last_txid, 3);
}

#[test]
fn uncommitted_tail_is_discarded() {
    let backend = InMemoryBackend::new();
    {
        let store = open(&backend);
        seed(&store, "b", &[(b"k", b"committed")]);
    }
    let committed_size = backend.size().unwrap();

    // A batch whose commit marker never made it to disk.
    let mut tail = backend.share();
    let orphan = LogRecord::Put {
        bucket: "b".into(),
        key: b"k".to_vec(),
        value: b"lost".to_vec(),
    };
    tail.append(&orphan.encode().unwrap()).unwrap();
    // And a torn half record after it.
    let torn = LogRecord::Commit { txid: 99 }.encode().unwrap();
    tail.append(&torn[..5]).unwrap();

    let store = open(&backend);
    assert_eq!(
        store.view(|tx| tx.get("b", b"k")).unwrap(),
        Some(b"committed".to_vec())
    );
    assert_eq!(backend.size().unwrap(), committed_size);
}

#[test]
fn corrupted_log_refuses_to_open() {
    let backend = InMemoryBackend::new();
    {
        let store = open(&backend);
        seed(&store, "b", &[(b"k", b"value")]);
    }
    let mut bytes = backend.data();
    let last = bytes.len() - 20;
    bytes[last] ^= 0xAA;

    let result = KvStore::open(
        Box::new(InMemoryBackend::with_data(bytes)),
        StoreOptions::default(),
    );
    assert!(matches!(result, Err(ref e) if e.is_corruption()));
}

#[test]
fn compaction_keeps_live_data_only() {
    let backend = InMemoryBackend::new();
    {
        let store = open(&backend);
        for round in 0..20u8 {
            seed(&store, "b", &[(b"hot", &[round]), (&[round], b"tmp")]);
            store.update(|tx| tx.delete("b", &[round])).unwrap();
        }
        seed(&store, "empty", &[]);

        let reclaimed = store.compact().unwrap();
        assert!(reclaimed > 0);
        assert_eq!(store.stats().unwrap().log_size, backend.size().unwrap());

        // Writes after compaction append to the rewritten log.
        seed(&store, "b", &[(b"after", b"compaction")]);
    }

    let store = open(&backend);
    assert_eq!(store.bucket_names().unwrap(), vec!["b", "empty"]);
    assert_eq!(store.view(|tx| tx.get("b", b"hot")).unwrap(), Some(vec![19]));
    assert_eq!(store.view(|tx| tx.len("b")).unwrap(), 2);
}

#[test]
fn closed_store_rejects_operations() {
    let store = open(&InMemoryBackend::new());
    store.close().unwrap();
    assert!(store.is_closed());
    assert!(matches!(store.bucket_names(), Err(StorageError::Closed)));
    assert!(matches!(
        store.update(|tx| tx.create_bucket_if_missing("b")),
        Err(StorageError::Closed)
    ));
}

#[test]
fn concurrent_increments_are_serialized() {
    let store = Arc::new(open(&InMemoryBackend::new()));
    seed(&store, "counter", &[(b"n", &0u64.to_be_bytes())]);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..25 {
                    store
                        .update(|tx| {
                            let raw = tx.get("counter", b"n")?.unwrap_or_default();
                            let mut buf = [0u8; 8];
                            buf.copy_from_slice(&raw);
                            let next = u64::from_be_bytes(buf) + 1;
                            tx.put("counter", b"n", &next.to_be_bytes())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let raw = store.view(|tx| tx.get("counter", b"n")).unwrap().unwrap();
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw);
    assert_eq!(u64::from_be_bytes(buf), 200);
}

#[test]
fn file_backed_store_persists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.tbl");
    {
        let backend = FileBackend::open(&path).unwrap();
        let store = KvStore::open(Box::new(backend), StoreOptions::default()).unwrap();
        seed(&store, "users", &[(b"1", br#"{"login":"root"}"#)]);
        store.close().unwrap();
    }

    let backend = FileBackend::open(&path).unwrap();
    let store = KvStore::open(Box::new(backend), StoreOptions { sync_on_commit: false }).unwrap();
    assert_eq!(
        store.view(|tx| tx.get("users", b"1")).unwrap(),
        Some(br#"{"login":"root"}"#.to_vec())
    );
}
