//! Remote database handle.

use crate::api::{Fields, RemoteApi};
use crate::collection::Collection;
use crate::config::RemoteConfig;
use crate::http::{HttpClient, HttpRemote};
use crate::memory::InMemoryRemote;
use serde_json::Value as Json;
use std::fmt;
use std::sync::Arc;
use tabula_core::{BackendKind, CacheRegistry, CoreError, CoreResult, Database, Model, RecordId};
use tracing::info;

/// A handle to a remote document backend.
///
/// Cloning is cheap; clones share the same API client and the same
/// collection caches.
#[derive(Clone)]
pub struct RemoteDb {
    api: Arc<dyn RemoteApi>,
    caches: Arc<CacheRegistry>,
}

impl RemoteDb {
    /// Wraps an API implementation.
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        Self {
            api,
            caches: Arc::new(CacheRegistry::new()),
        }
    }

    /// A database backed by a fresh [`InMemoryRemote`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRemote::new()))
    }

    /// Connects to the server in `config` through `client`.
    pub fn connect<C: HttpClient + 'static>(config: RemoteConfig, client: C) -> Self {
        info!(url = %config.base_url, "connecting to remote backend");
        Self::new(Arc::new(HttpRemote::new(config, client)))
    }

    /// Connects to the server in `config` with a blocking reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    #[cfg(feature = "reqwest")]
    pub fn open(config: RemoteConfig) -> crate::RemoteResult<Self> {
        let client = crate::ReqwestClient::new(config.timeout)?;
        Ok(Self::connect(config, client))
    }

    /// The API client behind this handle.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn RemoteApi> {
        &self.api
    }

    /// Opens the collection `name` for records shaped like `prototype`.
    ///
    /// Collections are created by the server on first insert; nothing is
    /// requested here. Collections opened through clones of this handle
    /// under the same name and model type share one cache.
    pub fn collection<M: Model>(&self, name: impl Into<String>, prototype: M) -> Collection<M> {
        let name = name.into();
        let cache = self.caches.cache_for::<M>(&name);
        Collection::new(self.clone(), name, prototype, cache)
    }
}

impl fmt::Debug for RemoteDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDb")
            .field("caches", &self.caches.len())
            .finish_non_exhaustive()
    }
}

impl Database for RemoteDb {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn fetch_raw(&self, table: &str, id: &RecordId) -> CoreResult<String> {
        let key = id.as_key().ok_or_else(|| CoreError::InvalidId {
            table: table.to_string(),
            id: id.to_string(),
            expected: "string",
        })?;
        let mut filter = Fields::new();
        filter.insert("id".to_string(), Json::String(key.to_string()));
        let record = self
            .api
            .list(table, &filter)
            .map_err(|e| e.into_core(format!("fetching {table}/{key}")))?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::not_found(table, key))?;
        Ok(serde_json::to_string(&record)?)
    }
}
