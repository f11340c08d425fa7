//! The remote document API the collection backend consumes.

use crate::error::RemoteResult;
use serde_json::Value as Json;

/// A record as a JSON field map, keyed by serialized field names.
pub type Fields = serde_json::Map<String, Json>;

/// Create/list/update/delete over named collections of JSON records.
///
/// Records carry a server-assigned string `id` field. `list` filters are
/// conjunctions of equality tests on serialized field names (dotted paths
/// reach into nested objects).
pub trait RemoteApi: Send + Sync {
    /// Lists records whose fields equal every pair in `filter`. An empty
    /// filter lists everything.
    ///
    /// # Errors
    ///
    /// Returns a transport, status, or protocol error.
    fn list(&self, collection: &str, filter: &Fields) -> RemoteResult<Vec<Fields>>;

    /// Creates a record and returns the identifier the server assigned.
    ///
    /// # Errors
    ///
    /// Returns a transport, status, or protocol error.
    fn create(&self, collection: &str, data: &Fields) -> RemoteResult<String>;

    /// Updates the record `id` with `data`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`](crate::RemoteError::NotFound) if
    /// there is no such record.
    fn update(&self, collection: &str, id: &str, data: &Fields) -> RemoteResult<()>;

    /// Deletes the record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`](crate::RemoteError::NotFound) if
    /// there is no such record.
    fn delete(&self, collection: &str, id: &str) -> RemoteResult<()>;
}

/// Follows a dotted path through nested objects.
#[must_use]
pub fn lookup<'a>(record: &'a Fields, path: &str) -> Option<&'a Json> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_follows_nested_objects() {
        let record = json!({"role": {"name": "admin"}, "login": "root"});
        let record = record.as_object().unwrap();
        assert_eq!(lookup(record, "login"), Some(&json!("root")));
        assert_eq!(lookup(record, "role.name"), Some(&json!("admin")));
        assert_eq!(lookup(record, "role.access"), None);
        assert_eq!(lookup(record, "login.x"), None);
    }
}
