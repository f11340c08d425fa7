//! The record contract shared by every backend.

use crate::error::{CoreError, CoreResult};
use crate::reflect::{set_field, Reflect};
use crate::table::Table;
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a stored record.
///
/// Bucket tables use sequential integers, remote collections use opaque
/// strings. `Seq(0)` and `Key("")` mean "not assigned yet".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Sequential identifier from a bucket allocator.
    Seq(u64),
    /// Opaque identifier assigned by a remote backend.
    Key(String),
}

impl RecordId {
    /// Returns true if no identifier has been assigned.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        match self {
            Self::Seq(n) => *n == 0,
            Self::Key(k) => k.is_empty(),
        }
    }

    /// Returns the identifier as a field value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Seq(n) => Value::UInt(*n),
            Self::Key(k) => Value::Str(k.clone()),
        }
    }

    /// Returns the sequential identifier, if this is one.
    #[must_use]
    pub fn as_seq(&self) -> Option<u64> {
        match self {
            Self::Seq(n) => Some(*n),
            Self::Key(_) => None,
        }
    }

    /// Returns the string key, if this is one.
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            Self::Seq(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seq(n) => write!(f, "{n}"),
            Self::Key(k) => f.write_str(k),
        }
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        Self::Seq(n)
    }
}

impl From<&str> for RecordId {
    fn from(k: &str) -> Self {
        Self::Key(k.to_string())
    }
}

impl From<String> for RecordId {
    fn from(k: String) -> Self {
        Self::Key(k)
    }
}

/// Which kind of backend a [`Database`] handle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// The embedded bucket store.
    Bucket,
    /// A remote document backend.
    Remote,
}

/// A database handle as seen from inside [`Model::create`].
///
/// Lets a model load related records lazily while it is being decoded.
pub trait Database: Send + Sync {
    /// The backend behind this handle.
    fn backend_kind(&self) -> BackendKind;

    /// Fetches the serialized form of a record from another table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the record does not exist, or a
    /// backend error.
    fn fetch_raw(&self, table: &str, id: &RecordId) -> CoreResult<String>;
}

/// A stored record type.
///
/// Implementors describe their fields with [`Reflect`] (see
/// [`impl_reflect!`](crate::impl_reflect)) and serialize with serde. Only
/// [`Model::id`] is required; everything else has a default.
pub trait Model: Reflect + Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Struct-level name of the identifier field.
    const ID_FIELD: &'static str = "id";

    /// Builds a record from its serialized form.
    ///
    /// The default decodes JSON and ignores `db`; override to resolve
    /// references to other tables through it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if `raw` is not a valid record.
    fn create(db: &dyn Database, raw: &str) -> CoreResult<Self> {
        let _ = db;
        Ok(serde_json::from_str(raw)?)
    }

    /// The record's identifier; unset before the first save.
    fn id(&self) -> RecordId;

    /// Writes an identifier into the record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the identifier does not fit
    /// the identifier field.
    fn set_id(&mut self, id: &RecordId) -> CoreResult<()> {
        set_field(self, Self::ID_FIELD, &id.to_value())
    }

    /// Hook run on the record right before it is persisted.
    fn prepare(&mut self) {}

    /// Saves the record into `table`, assigning an identifier if needed.
    ///
    /// # Errors
    ///
    /// Returns whatever the table's save reports.
    fn save<T: Table<Self> + ?Sized>(&mut self, table: &T) -> CoreResult<()> {
        table.save(self)
    }

    /// Deletes the record from `table`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidId`] if the record was never saved, or
    /// whatever the table's delete reports.
    fn delete<T: Table<Self> + ?Sized>(&self, table: &T) -> CoreResult<()> {
        let id = self.id();
        if id.is_unset() {
            return Err(CoreError::InvalidId {
                table: table.name().to_string(),
                id: id.to_string(),
                expected: "assigned",
            });
        }
        table.delete(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_identifiers() {
        assert!(RecordId::Seq(0).is_unset());
        assert!(RecordId::from("").is_unset());
        assert!(!RecordId::Seq(3).is_unset());
        assert!(!RecordId::from("abc").is_unset());
    }

    #[test]
    fn identifiers_serialize_bare() {
        assert_eq!(serde_json::to_string(&RecordId::Seq(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&RecordId::from("k1")).unwrap(), "\"k1\"");
        let back: RecordId = serde_json::from_str("\"k1\"").unwrap();
        assert_eq!(back.as_key(), Some("k1"));
    }

    #[test]
    fn display_and_values() {
        assert_eq!(RecordId::Seq(12).to_string(), "12");
        assert_eq!(RecordId::Seq(12).to_value(), Value::UInt(12));
        assert_eq!(RecordId::from("x").to_value(), Value::from("x"));
    }
}
