//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur inside the storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The log contains bytes that cannot be decoded.
    #[error("log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the offending record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A record checksum did not match its contents.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the offending record.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// Another handle holds the exclusive lock on the store file.
    #[error("store locked: {0} is held by another handle")]
    Locked(PathBuf),

    /// The named bucket does not exist.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// A bucket name, key, or value exceeds what the log format can encode.
    #[error("{what} too large: {size} bytes exceeds maximum of {max} bytes")]
    TooLarge {
        /// What was too large (bucket name, key, value).
        what: &'static str,
        /// Actual size in bytes.
        size: usize,
        /// Maximum encodable size in bytes.
        max: usize,
    },

    /// The store was closed.
    #[error("store is closed")]
    Closed,
}

impl StorageError {
    /// Creates a corruption error at the given log offset.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }

    /// Creates a bucket-not-found error.
    pub fn bucket_not_found(name: impl Into<String>) -> Self {
        Self::BucketNotFound(name.into())
    }

    /// Returns true if this error indicates on-disk damage rather than misuse.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted { .. } | Self::ChecksumMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_classification() {
        assert!(StorageError::corrupted(12, "bad magic").is_corruption());
        assert!(StorageError::ChecksumMismatch {
            offset: 0,
            expected: 1,
            actual: 2
        }
        .is_corruption());
        assert!(!StorageError::bucket_not_found("cars").is_corruption());
    }

    #[test]
    fn display_includes_context() {
        let err = StorageError::corrupted(42, "unknown record type 9");
        assert_eq!(
            err.to_string(),
            "log corrupted at offset 42: unknown record type 9"
        );

        let err = StorageError::TooLarge {
            what: "key",
            size: 10,
            max: 4,
        };
        assert!(err.to_string().starts_with("key too large"));
    }
}
