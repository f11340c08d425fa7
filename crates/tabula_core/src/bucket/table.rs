//! Typed tables over buckets.

use super::allocator::allocate;
use super::keys::encode_key;
use super::{Db, RawBucket};
use crate::error::{CoreError, CoreResult};
use crate::manager::Cache;
use crate::model::{Model, RecordId};
use crate::params::Filter;
use crate::reflect::field_by_path;
use crate::table::{Capabilities, Table};
use crate::value::{equals, Value};
use std::sync::Arc;
use tracing::debug;

/// A table of `M` records stored in one bucket.
pub struct Bucket<M: Model> {
    raw: RawBucket,
    prototype: M,
    cache: Arc<Cache<M>>,
}

impl<M: Model> Bucket<M> {
    pub(crate) fn new(raw: RawBucket, prototype: M, cache: Arc<Cache<M>>) -> Self {
        Self {
            raw,
            prototype,
            cache,
        }
    }

    /// Untyped view of the same bucket.
    #[must_use]
    pub fn raw(&self) -> &RawBucket {
        &self.raw
    }

    fn db(&self) -> &Db {
        self.raw.db()
    }

    fn seq(&self, id: &RecordId) -> CoreResult<u64> {
        id.as_seq().ok_or_else(|| CoreError::InvalidId {
            table: self.raw.name().to_string(),
            id: id.to_string(),
            expected: "sequential",
        })
    }

    fn decode_all(&self) -> CoreResult<Vec<M>> {
        self.raw
            .scan()?
            .into_iter()
            .map(|(_, raw)| M::create(self.db(), &raw))
            .collect()
    }
}

impl<M: Model> Table<M> for Bucket<M> {
    fn name(&self) -> &str {
        self.raw.name()
    }

    fn prototype(&self) -> &M {
        &self.prototype
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            exclude_filters: true,
            bulk_delete: true,
            sequential_ids: true,
        }
    }

    fn get(&self, id: &RecordId) -> CoreResult<M> {
        let raw = self.raw.get_raw(self.seq(id)?)?;
        M::create(self.db(), &raw)
    }

    /// Upserts `model` in one write transaction.
    ///
    /// A record whose identifier is zero, or non-zero but absent from the
    /// bucket, is treated as new and receives the next allocated identifier.
    /// `model` is left untouched unless the write commits.
    fn save(&self, model: &mut M) -> CoreResult<()> {
        let current = self.seq(&model.id())?;
        let mut staged = model.clone();
        staged.prepare();

        let name = self.raw.name();
        let id = self.db().store().update(|tx| {
            let exists = current != 0 && tx.get(name, &encode_key(current))?.is_some();
            let id = if exists { current } else { allocate(tx, name)? };

            let mut stored = staged.clone();
            stored.set_id(&RecordId::Seq(id))?;
            let bytes = serde_json::to_vec(&stored)?;
            tx.put(name, &encode_key(id), &bytes)?;
            Ok::<_, CoreError>(id)
        })?;

        staged.set_id(&RecordId::Seq(id))?;
        *model = staged;
        self.cache.record_saved(model);
        debug!(table = name, id, "saved record");
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> CoreResult<()> {
        self.raw.delete(self.seq(id)?)?;
        self.cache.evict(id);
        Ok(())
    }

    fn delete_all(&self) -> CoreResult<()> {
        self.raw.clear()?;
        self.cache.clear_entries();
        Ok(())
    }

    fn count(&self) -> CoreResult<u64> {
        self.raw.count()
    }

    fn all(&self) -> CoreResult<Vec<M>> {
        self.decode_all()
    }

    fn filter(&self, filter: &Filter) -> CoreResult<Vec<M>> {
        let mut matched = Vec::new();
        for model in self.decode_all()? {
            if filter.matches(&model)? {
                matched.push(model);
            }
        }
        Ok(matched)
    }

    /// Linear scan in identifier order, stopping at the first match.
    fn get_of_field(&self, field: &str, value: &Value) -> CoreResult<M> {
        for (_, raw) in self.raw.scan()? {
            let model = M::create(self.db(), &raw)?;
            if equals(&field_by_path(&model, field)?, value) {
                return Ok(model);
            }
        }
        Err(CoreError::not_found(self.name(), format!("{field}={value}")))
    }

    fn cache(&self) -> &Cache<M> {
        &self.cache
    }
}

impl<M: Model> std::fmt::Debug for Bucket<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.raw.name())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
