//! In-process remote API.

use crate::api::{lookup, Fields, RemoteApi};
use crate::error::{RemoteError, RemoteResult};
use parking_lot::RwLock;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use tabula_core::value::{equals, Value};

/// Length of generated record identifiers.
pub const ID_LENGTH: usize = 15;

/// A [`RemoteApi`] that keeps collections in memory.
///
/// Records are listed in creation order and get random 15-character
/// lowercase alphanumeric identifiers, like a PocketBase server assigns.
/// Useful for tests and offline runs.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    collections: RwLock<BTreeMap<String, Vec<Fields>>>,
}

impl InMemoryRemote {
    /// Creates an empty remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `collection`.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, Vec::len)
    }

    /// Returns true if `collection` holds no records.
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn generate_id() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LENGTH)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect()
    }

    fn not_found(collection: &str, id: &str) -> RemoteError {
        RemoteError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

fn json_equal(actual: &Json, expected: &Json) -> bool {
    match (Value::from_json(actual), Value::from_json(expected)) {
        (Some(a), Some(b)) => equals(&a, &b),
        _ => actual == expected,
    }
}

fn id_of(record: &Fields) -> Option<&str> {
    record.get("id").and_then(Json::as_str)
}

impl RemoteApi for InMemoryRemote {
    fn list(&self, collection: &str, filter: &Fields) -> RemoteResult<Vec<Fields>> {
        let collections = self.collections.read();
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .filter(|record| {
                filter.iter().all(|(path, expected)| {
                    lookup(record, path).is_some_and(|actual| json_equal(actual, expected))
                })
            })
            .cloned()
            .collect())
    }

    fn create(&self, collection: &str, data: &Fields) -> RemoteResult<String> {
        let id = Self::generate_id();
        let mut record = data.clone();
        record.insert("id".to_string(), Json::String(id.clone()));
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(record);
        Ok(id)
    }

    fn update(&self, collection: &str, id: &str, data: &Fields) -> RemoteResult<()> {
        let mut collections = self.collections.write();
        let record = collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|r| id_of(r) == Some(id)))
            .ok_or_else(|| Self::not_found(collection, id))?;
        for (key, value) in data {
            if key != "id" {
                record.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        let mut collections = self.collections.write();
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection, id))?;
        let position = records
            .iter()
            .position(|r| id_of(r) == Some(id))
            .ok_or_else(|| Self::not_found(collection, id))?;
        records.remove(position);
        Ok(())
    }
}
