//! Error types for Tabula core.

use tabula_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Boxed source error from a remote transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in Tabula core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No record with the requested identifier (or field value) exists.
    #[error("record not found in table {table}: {id}")]
    NotFound {
        /// Table that was searched.
        table: String,
        /// The identifier or lookup that missed.
        id: String,
    },

    /// A path segment names no field of the record type.
    #[error("type {type_name} has no field named {field}")]
    FieldNotFound {
        /// Name of the record type searched.
        type_name: &'static str,
        /// The missing field name.
        field: String,
    },

    /// A dotted path traverses a field that is not a nested record.
    #[error("field {segment} in path {path} is not a record")]
    NotStruct {
        /// The full path requested.
        path: String,
        /// The segment that could not be traversed.
        segment: String,
    },

    /// A value could not be converted to the field's type.
    #[error("cannot assign {found} to field {field} of type {expected}")]
    TypeMismatch {
        /// The field being written.
        field: String,
        /// The kind the field accepts.
        expected: &'static str,
        /// The kind that was supplied.
        found: &'static str,
    },

    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// JSON encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Remote backend error, carried verbatim.
    #[error("remote error during {context}: {source}")]
    Remote {
        /// What was being attempted.
        context: String,
        /// The underlying transport or API error.
        #[source]
        source: BoxError,
    },

    /// The backend cannot perform the requested operation.
    #[error("table {table} does not support {capability}")]
    Unsupported {
        /// Table the request was made against.
        table: String,
        /// The missing capability.
        capability: &'static str,
    },

    /// An identifier of the wrong shape was given to a table.
    #[error("table {table} expects {expected} identifiers, got {id}")]
    InvalidId {
        /// Table the identifier was given to.
        table: String,
        /// The offending identifier.
        id: String,
        /// The identifier shape the table uses.
        expected: &'static str,
    },

    /// A stored entry cannot be read as a record or counter.
    #[error("invalid entry {id} in table {table}: {message}")]
    InvalidRecord {
        /// Table holding the entry.
        table: String,
        /// Key of the entry.
        id: String,
        /// What is wrong with it.
        message: String,
    },

    /// A record was created remotely but its identifier could not be set locally.
    #[error("record created in {table} as {id} but identifier write-back failed: {source}")]
    IdentifierWriteBack {
        /// Table the record was created in.
        table: String,
        /// The identifier assigned by the remote backend.
        id: String,
        /// Why the write-back failed.
        #[source]
        source: Box<CoreError>,
    },

    /// Some deletions of a bulk delete failed.
    #[error("delete-all on {table} failed for {} of {attempted} records", failures.len())]
    DeleteAllIncomplete {
        /// Table being cleared.
        table: String,
        /// Number of deletions attempted.
        attempted: usize,
        /// Identifier and error message of each failed deletion.
        failures: Vec<(String, String)>,
    },
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(table: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.to_string(),
        }
    }

    /// Creates a field-not-found error.
    pub fn field_not_found(type_name: &'static str, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            type_name,
            field: field.into(),
        }
    }

    /// Wraps a remote error with what was being attempted.
    pub fn remote(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Remote {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Creates an unsupported-capability error.
    pub fn unsupported(table: impl Into<String>, capability: &'static str) -> Self {
        Self::Unsupported {
            table: table.into(),
            capability,
        }
    }

    /// Returns true for [`CoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
