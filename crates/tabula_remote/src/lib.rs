//! # Tabula Remote
//!
//! Remote document backend for Tabula tables.
//!
//! A [`RemoteDb`] wraps a [`RemoteApi`] (create/list/update/delete over named
//! collections of JSON records) and hands out [`Collection`] tables that
//! satisfy the same [`Table`](tabula_core::Table) contract as embedded
//! buckets. Identifiers are server-assigned strings.
//!
//! Two APIs ship with the crate:
//!
//! - [`InMemoryRemote`] keeps collections in process memory.
//! - [`HttpRemote`] speaks a PocketBase-style REST API through any
//!   [`HttpClient`]; enable the `reqwest` feature for a ready-made blocking
//!   client.
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use tabula_core::{impl_reflect, Filter, Model, Params, RecordId, Table};
//! use tabula_remote::RemoteDb;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Car {
//!     id: String,
//!     model: String,
//! }
//!
//! impl_reflect!(Car { value id, value model });
//!
//! impl Model for Car {
//!     fn id(&self) -> RecordId {
//!         RecordId::Key(self.id.clone())
//!     }
//! }
//!
//! let db = RemoteDb::in_memory();
//! let cars = db.collection("car", Car::default());
//! let mut car = Car { model: "Tesla".into(), ..Car::default() };
//! car.save(&cars).unwrap();
//! assert!(!car.id.is_empty());
//!
//! let found = cars.filter(&Filter::include(Params::new().with("model", "Tesla"))).unwrap();
//! assert_eq!(found[0].id, car.id);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod collection;
mod config;
mod database;
mod error;
mod http;
mod memory;
#[cfg(feature = "reqwest")]
mod reqwest_client;

pub use api::{lookup, Fields, RemoteApi};
pub use collection::Collection;
pub use config::RemoteConfig;
pub use database::RemoteDb;
pub use error::{RemoteError, RemoteResult};
pub use http::{filter_expression, HttpClient, HttpRemote, HttpRequest, HttpResponse, Method};
pub use memory::{InMemoryRemote, ID_LENGTH};
#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;
