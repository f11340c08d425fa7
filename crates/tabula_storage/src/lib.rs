//! # Tabula Storage
//!
//! The embedded ordered key/value store underneath Tabula buckets.
//!
//! The store keeps one ordered map per named bucket. Every committed write
//! transaction is appended to a checksummed log on a [`StorageBackend`] and
//! replayed when the store is opened again.
//!
//! ## Design Principles
//!
//! - Backends are opaque append-only byte stores with no format knowledge
//! - One writer at a time; readers see committed state only
//! - A batch is visible after its commit marker is durable, never partially
//! - Damaged logs refuse to open; torn tails are cut off
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - For persistent stores (exclusively locked)
//!
//! ## Example
//!
//! ```rust
//! use tabula_storage::{InMemoryBackend, KvStore, StorageError, StoreOptions};
//!
//! let store = KvStore::open(Box::new(InMemoryBackend::new()), StoreOptions::default()).unwrap();
//! store
//!     .update(|tx| {
//!         tx.create_bucket_if_missing("cars")?;
//!         tx.put("cars", b"k1", b"tesla")?;
//!         Ok::<_, StorageError>(())
//!     })
//!     .unwrap();
//!
//! let value = store.view(|tx| tx.get("cars", b"k1")).unwrap();
//! assert_eq!(value.as_deref(), Some(&b"tesla"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod record;
mod store;
mod txn;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use record::{Decoded, LogRecord, RecordType, HEADER_SIZE, LOG_MAGIC, LOG_VERSION};
pub use store::{KvStore, StoreOptions, StoreStats};
pub use txn::{ReadTxn, WriteTxn};
