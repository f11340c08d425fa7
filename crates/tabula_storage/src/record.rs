//! Log record types and their binary envelope.
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The CRC covers every byte before it.

use crate::error::{StorageError, StorageResult};

/// Magic bytes identifying a log record.
pub const LOG_MAGIC: [u8; 4] = *b"TBLG";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Longest encodable bucket name.
pub const MAX_BUCKET_NAME: usize = u16::MAX as usize;

/// Longest encodable key or value.
pub const MAX_PAYLOAD: usize = u32::MAX as usize;

/// Type tag of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Create an empty bucket.
    CreateBucket = 1,
    /// Insert or overwrite a key.
    Put = 2,
    /// Remove a key.
    Delete = 3,
    /// Remove every key of a bucket, keeping the bucket.
    ClearBucket = 4,
    /// Remove a bucket entirely.
    DropBucket = 5,
    /// Terminates a transaction batch.
    Commit = 6,
}

impl RecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::CreateBucket),
            2 => Some(Self::Put),
            3 => Some(Self::Delete),
            4 => Some(Self::ClearBucket),
            5 => Some(Self::DropBucket),
            6 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One mutation (or commit marker) in the key/value log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Create an empty bucket.
    CreateBucket {
        /// Bucket name.
        bucket: String,
    },
    /// Insert or overwrite a key.
    Put {
        /// Bucket name.
        bucket: String,
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete {
        /// Bucket name.
        bucket: String,
        /// Key bytes.
        key: Vec<u8>,
    },
    /// Remove every key of a bucket.
    ClearBucket {
        /// Bucket name.
        bucket: String,
    },
    /// Remove a bucket.
    DropBucket {
        /// Bucket name.
        bucket: String,
    },
    /// End of a transaction batch.
    Commit {
        /// Transaction id, strictly increasing across the log.
        txid: u64,
    },
}

/// Outcome of decoding at an offset.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A complete record and the offset right after it.
    Record(LogRecord, usize),
    /// Not enough bytes for a complete record: a torn tail.
    Incomplete,
}

impl LogRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::CreateBucket { .. } => RecordType::CreateBucket,
            Self::Put { .. } => RecordType::Put,
            Self::Delete { .. } => RecordType::Delete,
            Self::ClearBucket { .. } => RecordType::ClearBucket,
            Self::DropBucket { .. } => RecordType::DropBucket,
            Self::Commit { .. } => RecordType::Commit,
        }
    }

    /// Returns the bucket this record touches, if any.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        match self {
            Self::CreateBucket { bucket }
            | Self::Put { bucket, .. }
            | Self::Delete { bucket, .. }
            | Self::ClearBucket { bucket }
            | Self::DropBucket { bucket } => Some(bucket),
            Self::Commit { .. } => None,
        }
    }

    /// Appends the full enveloped record to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TooLarge`] if a field exceeds the format limits.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> StorageResult<()> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len()).map_err(|_| StorageError::TooLarge {
            what: "record",
            size: payload.len(),
            max: MAX_PAYLOAD,
        })?;

        let start = out.len();
        out.extend_from_slice(&LOG_MAGIC);
        out.extend_from_slice(&LOG_VERSION.to_le_bytes());
        out.push(self.record_type().as_byte());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&payload);
        let crc = crc32fast::hash(&out[start..]);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(())
    }

    /// Encodes the record into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TooLarge`] if a field exceeds the format limits.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    fn encode_payload(&self) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::CreateBucket { bucket }
            | Self::ClearBucket { bucket }
            | Self::DropBucket { bucket } => put_name(&mut buf, bucket)?,
            Self::Put { bucket, key, value } => {
                put_name(&mut buf, bucket)?;
                put_bytes(&mut buf, "key", key)?;
                put_bytes(&mut buf, "value", value)?;
            }
            Self::Delete { bucket, key } => {
                put_name(&mut buf, bucket)?;
                put_bytes(&mut buf, "key", key)?;
            }
            Self::Commit { txid } => buf.extend_from_slice(&txid.to_le_bytes()),
        }
        Ok(buf)
    }

    /// Decodes the record starting at `offset` in `data`.
    ///
    /// Truncated headers and payloads decode as [`Decoded::Incomplete`]; bad
    /// magic, unknown types, future versions, and checksum mismatches are
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns a corruption error as described above.
    pub fn decode_at(data: &[u8], offset: usize) -> StorageResult<Decoded> {
        let at = offset as u64;
        let rest = &data[offset.min(data.len())..];
        if rest.len() < HEADER_SIZE {
            return Ok(Decoded::Incomplete);
        }
        if rest[0..4] != LOG_MAGIC {
            return Err(StorageError::corrupted(at, "invalid magic bytes"));
        }
        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version > LOG_VERSION {
            return Err(StorageError::corrupted(
                at,
                format!("unsupported log version {version}"),
            ));
        }
        let record_type = RecordType::from_byte(rest[6]).ok_or_else(|| {
            StorageError::corrupted(at, format!("unknown record type {}", rest[6]))
        })?;
        let len = u32::from_le_bytes([rest[7], rest[8], rest[9], rest[10]]) as usize;
        let total = HEADER_SIZE + len + CRC_SIZE;
        if rest.len() < total {
            return Ok(Decoded::Incomplete);
        }

        let body_end = HEADER_SIZE + len;
        let stored = u32::from_le_bytes([
            rest[body_end],
            rest[body_end + 1],
            rest[body_end + 2],
            rest[body_end + 3],
        ]);
        let computed = crc32fast::hash(&rest[..body_end]);
        if stored != computed {
            return Err(StorageError::ChecksumMismatch {
                offset: at,
                expected: stored,
                actual: computed,
            });
        }

        let record = Self::decode_payload(record_type, &rest[HEADER_SIZE..body_end], at)?;
        Ok(Decoded::Record(record, offset + total))
    }

    fn decode_payload(record_type: RecordType, payload: &[u8], at: u64) -> StorageResult<Self> {
        let mut cursor = Cursor {
            payload,
            pos: 0,
            at,
        };
        let record = match record_type {
            RecordType::CreateBucket => Self::CreateBucket {
                bucket: cursor.name()?,
            },
            RecordType::ClearBucket => Self::ClearBucket {
                bucket: cursor.name()?,
            },
            RecordType::DropBucket => Self::DropBucket {
                bucket: cursor.name()?,
            },
            RecordType::Put => Self::Put {
                bucket: cursor.name()?,
                key: cursor.bytes()?,
                value: cursor.bytes()?,
            },
            RecordType::Delete => Self::Delete {
                bucket: cursor.name()?,
                key: cursor.bytes()?,
            },
            RecordType::Commit => Self::Commit {
                txid: u64::from_le_bytes(cursor.take_array::<8>()?),
            },
        };
        if cursor.pos != payload.len() {
            return Err(StorageError::corrupted(at, "trailing bytes in payload"));
        }
        Ok(record)
    }
}

fn put_name(buf: &mut Vec<u8>, name: &str) -> StorageResult<()> {
    let len = u16::try_from(name.len()).map_err(|_| StorageError::TooLarge {
        what: "bucket name",
        size: name.len(),
        max: MAX_BUCKET_NAME,
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
    Ok(())
}

fn put_bytes(buf: &mut Vec<u8>, what: &'static str, bytes: &[u8]) -> StorageResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| StorageError::TooLarge {
        what,
        size: bytes.len(),
        max: MAX_PAYLOAD,
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct Cursor<'a> {
    payload: &'a [u8],
    pos: usize,
    at: u64,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> StorageResult<&[u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.payload.len());
        let end = end.ok_or_else(|| StorageError::corrupted(self.at, "unexpected end of payload"))?;
        let slice = &self.payload[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> StorageResult<[u8; N]> {
        let at = self.at;
        self.take(N)?
            .try_into()
            .map_err(|_| StorageError::corrupted(at, "short integer"))
    }

    fn name(&mut self) -> StorageResult<String> {
        let len = u16::from_le_bytes(self.take_array::<2>()?) as usize;
        let at = self.at;
        let raw = self.take(len)?.to_vec();
        String::from_utf8(raw).map_err(|_| StorageError::corrupted(at, "bucket name is not UTF-8"))
    }

    fn bytes(&mut self) -> StorageResult<Vec<u8>> {
        let len = u32::from_le_bytes(self.take_array::<4>()?) as usize;
        Ok(self.take(len)?.to_vec())
    }
}
