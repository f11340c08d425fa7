//! # Tabula Core
//!
//! Typed tables of records over interchangeable backends.
//!
//! This crate provides:
//! - The [`Model`] and [`Table`] contracts every backend satisfies
//! - Field descriptors ([`Reflect`], [`impl_reflect!`]) for filtering by
//!   field name or dotted path without per-query code
//! - Field-equality [`Filter`]s with include and exclude sets
//! - The embedded bucket backend ([`Db`], [`Bucket`]) with atomic
//!   sequential identifiers
//! - A per-table object cache driven through [`Manager`]
//! - User and role models with credential checks ([`auth`])
//!
//! ## Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use tabula_core::{impl_reflect, Db, Filter, Model, Params, RecordId, Table};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Car {
//!     id: u64,
//!     model: String,
//!     city: String,
//! }
//!
//! impl_reflect!(Car { value id, value model, value city });
//!
//! impl Model for Car {
//!     fn id(&self) -> RecordId {
//!         RecordId::Seq(self.id)
//!     }
//! }
//!
//! let db = Db::open_in_memory().unwrap();
//! let cars = db.bucket("car", Car::default()).unwrap();
//!
//! let mut car = Car { model: "Tesla".into(), city: "Moscow".into(), ..Car::default() };
//! car.save(&cars).unwrap();
//! assert_eq!(car.id, 1);
//!
//! let teslas = cars
//!     .manager()
//!     .filter(&Filter::include(Params::new().with("model", "Tesla")))
//!     .unwrap();
//! assert_eq!(teslas.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod bucket;
mod config;
mod error;
pub mod manager;
mod model;
mod params;
pub mod reflect;
mod table;
pub mod value;

pub use bucket::{Bucket, Db, RawBucket};
pub use config::Config;
pub use error::{BoxError, CoreError, CoreResult};
pub use manager::{Cache, CacheMode, CacheRegistry, Manager};
pub use model::{BackendKind, Database, Model, RecordId};
pub use params::{Filter, Params};
pub use reflect::{field_by_path, set_field, storage_path, tag_for, Field, FieldMut, Reflect};
pub use table::{Capabilities, Table};
pub use value::{compare, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export of the storage engine.
pub use tabula_storage as storage;
