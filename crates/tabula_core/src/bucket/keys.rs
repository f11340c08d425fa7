//! Key and counter encodings inside a bucket.
//!
//! Record identifiers are stored as 8-byte big-endian keys so the store's
//! byte order matches numeric order. Key `0` is the counter cell; its value
//! is the next identifier to hand out, as decimal text.

/// Identifier of the counter cell.
pub const COUNTER_ID: u64 = 0;

/// Encodes an identifier as a store key.
#[must_use]
pub fn encode_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decodes a store key; `None` if it is not 8 bytes long.
#[must_use]
pub fn decode_key(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// First key after the counter cell.
#[must_use]
pub fn first_record_key() -> [u8; 8] {
    encode_key(COUNTER_ID + 1)
}

pub(crate) fn encode_counter(next: u64) -> Vec<u8> {
    next.to_string().into_bytes()
}

pub(crate) fn decode_counter(raw: &[u8]) -> Option<u64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}
