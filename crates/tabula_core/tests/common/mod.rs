//! Shared models and fixtures for the integration tests.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use tabula_core::{impl_reflect, CoreResult, Database, Db, Model, RecordId};
use tempfile::TempDir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: u64,
    pub model: String,
    pub color: String,
    #[serde(rename = "city_name")]
    pub city: String,
}

impl_reflect!(Car {
    value id,
    value model,
    value color,
    value city as { "json": "city_name" },
});

impl Model for Car {
    fn id(&self) -> RecordId {
        RecordId::Seq(self.id)
    }
}

impl Car {
    pub fn new(model: &str, color: &str, city: &str) -> Self {
        Self {
            id: 0,
            model: model.into(),
            color: color.into(),
            city: city.into(),
        }
    }
}

/// A record that resolves a reference to another table while decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: u64,
    pub car_id: u64,
    pub km: u32,
    #[serde(skip)]
    pub car: Option<Car>,
}

impl_reflect!(Trip {
    value id,
    value car_id,
    value km,
});

impl Model for Trip {
    fn create(db: &dyn Database, raw: &str) -> CoreResult<Self> {
        let mut trip: Trip = serde_json::from_str(raw)?;
        if trip.car_id != 0 {
            let car_raw = db.fetch_raw("car", &RecordId::Seq(trip.car_id))?;
            trip.car = Some(serde_json::from_str(&car_raw)?);
        }
        Ok(trip)
    }

    fn id(&self) -> RecordId {
        RecordId::Seq(self.id)
    }
}

/// A file-backed database in a temporary directory.
pub struct TestDb {
    pub db: Db,
    pub dir: TempDir,
}

impl TestDb {
    pub fn file() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let db = Db::open(dir.path().join("test.tbl"), tabula_core::Config::default())
            .expect("open file database");
        Self { db, dir }
    }
}

impl std::ops::Deref for TestDb {
    type Target = Db;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// The three cars used by the filter scenarios.
pub fn seed_cars(db: &Db) -> tabula_core::Bucket<Car> {
    let cars = db.bucket("car", Car::default()).expect("open car bucket");
    for mut car in [
        Car::new("Tesla", "red", "Moscow"),
        Car::new("Tesla", "black", "Paris"),
        Car::new("BMW", "white", "Moscow"),
    ] {
        car.save(&cars).expect("save car");
    }
    cars
}
