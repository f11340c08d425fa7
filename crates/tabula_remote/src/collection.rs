//! Typed tables over remote collections.

use crate::api::Fields;
use crate::database::RemoteDb;
use serde_json::Value as Json;
use std::sync::Arc;
use tabula_core::{
    field_by_path, storage_path, Cache, Capabilities, CoreError, CoreResult, Filter, Model,
    RecordId, Table,
};
use tracing::{debug, warn};

/// Tag namespace holding serialized field names.
const JSON_TAGS: &str = "json";

/// A table of `M` records kept in a remote collection.
///
/// Filter keys are struct-level field paths; they are translated to
/// serialized names through the model's `json` tags before being sent.
pub struct Collection<M: Model> {
    db: RemoteDb,
    name: String,
    prototype: M,
    cache: Arc<Cache<M>>,
}

impl<M: Model> Collection<M> {
    pub(crate) fn new(db: RemoteDb, name: String, prototype: M, cache: Arc<Cache<M>>) -> Self {
        Self {
            db,
            name,
            prototype,
            cache,
        }
    }

    /// The database this collection belongs to.
    #[must_use]
    pub fn db(&self) -> &RemoteDb {
        &self.db
    }

    fn key<'a>(&self, id: &'a RecordId) -> CoreResult<&'a str> {
        id.as_key().ok_or_else(|| CoreError::InvalidId {
            table: self.name.clone(),
            id: id.to_string(),
            expected: "string",
        })
    }

    fn decode(&self, record: Fields) -> CoreResult<M> {
        let raw = serde_json::to_string(&Json::Object(record))?;
        M::create(&self.db, &raw)
    }

    fn list(&self, filter: &Fields, context: &str) -> CoreResult<Vec<Fields>> {
        self.db
            .api()
            .list(&self.name, filter)
            .map_err(|e| e.into_core(format!("{context} {}", self.name)))
    }

    /// Serialized form of `model` without its identifier field.
    fn payload(&self, model: &M) -> CoreResult<Fields> {
        let Json::Object(mut data) = serde_json::to_value(model)? else {
            return Err(CoreError::InvalidRecord {
                table: self.name.clone(),
                id: model.id().to_string(),
                message: "record does not serialize to an object".to_string(),
            });
        };
        data.remove(&storage_path(model, M::ID_FIELD, JSON_TAGS));
        Ok(data)
    }

    /// Creates a record from `data` and writes the new key into `model`.
    fn create(&self, model: &mut M, data: &Fields) -> CoreResult<()> {
        let created = self
            .db
            .api()
            .create(&self.name, data)
            .map_err(|e| e.into_core(format!("creating record in {}", self.name)))?;
        model
            .set_id(&RecordId::Key(created.clone()))
            .map_err(|source| CoreError::IdentifierWriteBack {
                table: self.name.clone(),
                id: created.clone(),
                source: Box::new(source),
            })?;
        debug!(collection = %self.name, id = %created, "created record");
        Ok(())
    }
}

fn id_of(record: &Fields) -> Option<&str> {
    record.get("id").and_then(Json::as_str)
}

impl<M: Model> Table<M> for Collection<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn prototype(&self) -> &M {
        &self.prototype
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            exclude_filters: false,
            bulk_delete: false,
            sequential_ids: false,
        }
    }

    fn get(&self, id: &RecordId) -> CoreResult<M> {
        let key = self.key(id)?;
        let mut filter = Fields::new();
        filter.insert("id".to_string(), Json::String(key.to_string()));
        let record = self
            .list(&filter, "getting record from")?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::not_found(&self.name, key))?;
        self.decode(record)
    }

    /// Creates the record if its identifier is unset, updates it otherwise.
    ///
    /// On create the server-assigned identifier is written back into
    /// `model`. If that write-back fails the record already exists remotely
    /// and the error says so. An update of a record the server no longer
    /// has creates it again under a new identifier. `model` is left
    /// untouched unless the write succeeds.
    fn save(&self, model: &mut M) -> CoreResult<()> {
        let id = model.id();
        let key = self.key(&id)?.to_string();
        let mut staged = model.clone();
        staged.prepare();
        let data = self.payload(&staged)?;

        if key.is_empty() {
            self.create(&mut staged, &data)?;
        } else {
            match self.db.api().update(&self.name, &key, &data) {
                Ok(()) => debug!(collection = %self.name, id = %key, "updated record"),
                Err(e) if e.is_not_found() => {
                    debug!(collection = %self.name, id = %key, "record vanished, creating it again");
                    self.cache.evict(&id);
                    self.create(&mut staged, &data)?;
                }
                Err(e) => return Err(e.into_core(format!("updating record in {}", self.name))),
            }
        }

        *model = staged;
        self.cache.record_saved(model);
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> CoreResult<()> {
        let key = self.key(id)?;
        match self.db.api().delete(&self.name, key) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into_core(format!("deleting record from {}", self.name))),
        }
        self.cache.evict(id);
        Ok(())
    }

    /// Deletes records one request at a time.
    ///
    /// Every record is attempted even after a failure; failures are reported
    /// together once the pass is over. Records that could not be deleted stay
    /// cached.
    fn delete_all(&self) -> CoreResult<()> {
        let records = self.list(&Fields::new(), "listing")?;
        warn!(
            collection = %self.name,
            records = records.len(),
            "delete_all issues one request per record"
        );

        let attempted = records.len();
        let mut failures = Vec::new();
        for record in &records {
            let Some(key) = id_of(record) else {
                failures.push((String::new(), "record without id".to_string()));
                continue;
            };
            match self.db.api().delete(&self.name, key) {
                Err(e) if !e.is_not_found() => failures.push((key.to_string(), e.to_string())),
                _ => {
                    self.cache.evict(&RecordId::Key(key.to_string()));
                }
            }
        }

        if failures.is_empty() {
            self.cache.clear_entries();
            Ok(())
        } else {
            Err(CoreError::DeleteAllIncomplete {
                table: self.name.clone(),
                attempted,
                failures,
            })
        }
    }

    fn count(&self) -> CoreResult<u64> {
        Ok(self.list(&Fields::new(), "counting")?.len() as u64)
    }

    fn all(&self) -> CoreResult<Vec<M>> {
        self.list(&Fields::new(), "listing")?
            .into_iter()
            .map(|record| self.decode(record))
            .collect()
    }

    fn filter(&self, filter: &Filter) -> CoreResult<Vec<M>> {
        if filter.has_exclusions() {
            return Err(CoreError::unsupported(&self.name, "exclude filters"));
        }
        let mut remote = Fields::new();
        for (path, value) in filter.include.iter() {
            field_by_path(&self.prototype, path)?;
            remote.insert(storage_path(&self.prototype, path, JSON_TAGS), value.to_json());
        }
        self.list(&remote, "filtering")?
            .into_iter()
            .map(|record| self.decode(record))
            .collect()
    }

    fn cache(&self) -> &Cache<M> {
        &self.cache
    }
}

impl<M: Model> std::fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("cached", &self.cache.len())
            .finish()
    }
}
