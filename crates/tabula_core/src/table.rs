//! The table contract both backends satisfy.

use crate::error::{CoreError, CoreResult};
use crate::manager::{Cache, Manager};
use crate::model::{Model, RecordId};
use crate::params::{Filter, Params};
use crate::value::Value;

/// What a table's backend can do natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Filters may carry exclude sets.
    pub exclude_filters: bool,
    /// `delete_all` is a single backend operation rather than one call per
    /// record.
    pub bulk_delete: bool,
    /// Identifiers are allocated sequentially by the table.
    pub sequential_ids: bool,
}

/// A named collection of records of one model type.
///
/// A table owns the cache its [`Manager`] works with. Implementations keep
/// that cache coherent: a successful save refreshes the record's entry, a
/// delete evicts it, and `delete_all` empties it.
pub trait Table<M: Model> {
    /// Name of the table in its backend.
    fn name(&self) -> &str;

    /// The prototype record the table was opened with.
    fn prototype(&self) -> &M;

    /// What the backend supports.
    fn capabilities(&self) -> Capabilities;

    /// Fetches one record from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if there is no such record.
    fn get(&self, id: &RecordId) -> CoreResult<M>;

    /// Inserts or updates a record. An unset identifier is assigned and
    /// written back into `model`.
    ///
    /// # Errors
    ///
    /// Returns a backend or codec error; the record is unchanged in storage.
    fn save(&self, model: &mut M) -> CoreResult<()>;

    /// Deletes one record. Deleting an absent record is not an error.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    fn delete(&self, id: &RecordId) -> CoreResult<()>;

    /// Deletes every record.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    fn delete_all(&self) -> CoreResult<()>;

    /// Number of records.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    fn count(&self) -> CoreResult<u64>;

    /// Every record, in backend order.
    ///
    /// # Errors
    ///
    /// Returns a backend or codec error.
    fn all(&self) -> CoreResult<Vec<M>>;

    /// Records passing `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Unsupported`] if the filter needs a capability the
    /// backend lacks, a lookup error for unknown fields, or a backend error.
    fn filter(&self, filter: &Filter) -> CoreResult<Vec<M>>;

    /// First record whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if nothing matches.
    fn get_of_field(&self, field: &str, value: &Value) -> CoreResult<M> {
        let params = Params::new().with(field, value.clone());
        self.filter(&Filter::include(params))?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::not_found(self.name(), format!("{field}={value}")))
    }

    /// The table's object cache.
    fn cache(&self) -> &Cache<M>;

    /// A cache-backed view over this table.
    fn manager(&self) -> Manager<'_, M, Self>
    where
        Self: Sized,
    {
        Manager::new(self)
    }
}
