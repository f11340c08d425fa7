//! Integration tests for remote collections.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tabula_core::{
    impl_reflect, CacheMode, CoreError, CoreResult, Database, Filter, Model, Params, RecordId,
    Table, Value,
};
use tabula_remote::{Fields, InMemoryRemote, RemoteApi, RemoteDb, RemoteError, RemoteResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Car {
    id: String,
    model: String,
    color: String,
    #[serde(rename = "city_name")]
    city: String,
}

impl_reflect!(Car {
    value id,
    value model,
    value color,
    value city as { "json": "city_name" },
});

impl Model for Car {
    fn id(&self) -> RecordId {
        RecordId::Key(self.id.clone())
    }
}

impl Car {
    fn new(model: &str, color: &str, city: &str) -> Self {
        Self {
            id: String::new(),
            model: model.into(),
            color: color.into(),
            city: city.into(),
        }
    }
}

/// Resolves its car through the database handle while decoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Trip {
    id: String,
    car_id: String,
    #[serde(skip)]
    car: Option<Car>,
}

impl_reflect!(Trip { value id, value car_id });

impl Model for Trip {
    fn create(db: &dyn Database, raw: &str) -> CoreResult<Self> {
        let mut trip: Trip = serde_json::from_str(raw)?;
        if !trip.car_id.is_empty() {
            let car = db.fetch_raw("car", &RecordId::from(trip.car_id.as_str()))?;
            trip.car = Some(serde_json::from_str(&car)?);
        }
        Ok(trip)
    }

    fn id(&self) -> RecordId {
        RecordId::Key(self.id.clone())
    }
}

/// A record whose identifier field cannot hold a server key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Badge {
    id: u64,
    label: String,
}

impl_reflect!(Badge { value id, value label });

impl Model for Badge {
    fn id(&self) -> RecordId {
        RecordId::Key(String::new())
    }
}

/// A note whose title defaults when saved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Note {
    id: String,
    title: String,
}

impl_reflect!(Note { value id, value title });

impl Model for Note {
    fn id(&self) -> RecordId {
        RecordId::Key(self.id.clone())
    }

    fn prepare(&mut self) {
        if self.title.is_empty() {
            self.title = "untitled".into();
        }
    }
}

/// Wraps an in-memory remote, recording list filters and failing on demand.
#[derive(Default)]
struct Scripted {
    inner: InMemoryRemote,
    lists: Mutex<Vec<Fields>>,
    failing_deletes: Mutex<BTreeSet<String>>,
    down: Mutex<bool>,
}

impl Scripted {
    fn check(&self) -> RemoteResult<()> {
        if *self.down.lock() {
            Err(RemoteError::transport("connection refused", true))
        } else {
            Ok(())
        }
    }
}

impl RemoteApi for Scripted {
    fn list(&self, collection: &str, filter: &Fields) -> RemoteResult<Vec<Fields>> {
        self.check()?;
        self.lists.lock().push(filter.clone());
        self.inner.list(collection, filter)
    }

    fn create(&self, collection: &str, data: &Fields) -> RemoteResult<String> {
        self.check()?;
        self.inner.create(collection, data)
    }

    fn update(&self, collection: &str, id: &str, data: &Fields) -> RemoteResult<()> {
        self.check()?;
        self.inner.update(collection, id, data)
    }

    fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        self.check()?;
        if self.failing_deletes.lock().contains(id) {
            return Err(RemoteError::Status {
                status: 500,
                body: "boom".into(),
            });
        }
        self.inner.delete(collection, id)
    }
}

fn scripted() -> (Arc<Scripted>, RemoteDb) {
    let api = Arc::new(Scripted::default());
    let db = RemoteDb::new(api.clone());
    (api, db)
}

fn seed(db: &RemoteDb) -> tabula_remote::Collection<Car> {
    let cars = db.collection("car", Car::default());
    for mut car in [
        Car::new("Tesla", "red", "Moscow"),
        Car::new("Tesla", "black", "Paris"),
        Car::new("BMW", "white", "Moscow"),
    ] {
        car.save(&cars).unwrap();
    }
    cars
}

#[test]
fn save_assigns_server_identifiers() {
    let db = RemoteDb::in_memory();
    let cars = db.collection("car", Car::default());
    let mut car = Car::new("Tesla", "red", "Moscow");
    car.save(&cars).unwrap();

    assert_eq!(car.id.len(), tabula_remote::ID_LENGTH);
    let fetched = cars.get(&car.id()).unwrap();
    assert_eq!(fetched, car);
    assert_eq!(cars.count().unwrap(), 1);
}

#[test]
fn save_with_identifier_updates_in_place() {
    let db = RemoteDb::in_memory();
    let cars = seed(&db);
    let mut car = cars.all().unwrap().remove(0);
    car.color = "green".into();
    car.save(&cars).unwrap();

    assert_eq!(cars.count().unwrap(), 3);
    assert_eq!(cars.get(&car.id()).unwrap().color, "green");
}

#[test]
fn save_of_vanished_record_creates_it_again() {
    let db = RemoteDb::in_memory();
    let cars = seed(&db);
    let mut car = cars.all().unwrap().remove(0);
    let old = car.id.clone();
    cars.delete(&car.id()).unwrap();

    car.color = "green".into();
    car.save(&cars).unwrap();
    assert_ne!(car.id, old);
    assert_eq!(car.id.len(), tabula_remote::ID_LENGTH);
    assert_eq!(cars.count().unwrap(), 3);
    assert_eq!(cars.get(&car.id()).unwrap().color, "green");
    assert!(cars.get(&RecordId::Key(old)).unwrap_err().is_not_found());
}

#[test]
fn failed_save_leaves_model_unprepared() {
    let (api, db) = scripted();
    let notes = db.collection("note", Note::default());

    *api.down.lock() = true;
    let mut note = Note::default();
    assert!(note.save(&notes).is_err());
    assert!(note.title.is_empty());
    assert!(note.id.is_empty());

    *api.down.lock() = false;
    note.save(&notes).unwrap();
    assert_eq!(note.title, "untitled");
    assert_eq!(notes.get(&note.id()).unwrap().title, "untitled");
}

#[test]
fn get_missing_record_is_not_found() {
    let db = RemoteDb::in_memory();
    let cars = seed(&db);
    assert!(cars.get(&RecordId::from("nope")).unwrap_err().is_not_found());
}

#[test]
fn sequential_identifiers_are_rejected() {
    let db = RemoteDb::in_memory();
    let cars = seed(&db);
    assert!(matches!(
        cars.get(&RecordId::Seq(1)),
        Err(CoreError::InvalidId { expected: "string", .. })
    ));
}

#[test]
fn filter_sends_serialized_field_names() {
    let (api, db) = scripted();
    let cars = seed(&db);

    let moscow = cars
        .filter(&Filter::include(Params::new().with("city", "Moscow")))
        .unwrap();
    assert_eq!(moscow.len(), 2);

    let sent = api.lists.lock().last().cloned().unwrap();
    assert_eq!(sent.get("city_name"), Some(&json!("Moscow")));
    assert!(sent.get("city").is_none());
}

#[test]
fn filter_with_exclusions_is_unsupported() {
    let db = RemoteDb::in_memory();
    let cars = seed(&db);
    assert!(!cars.capabilities().exclude_filters);

    let filter = Filter::include(Params::new().with("model", "Tesla"))
        .exclude(Params::new().with("city", "Paris"));
    assert!(matches!(
        cars.filter(&filter),
        Err(CoreError::Unsupported { capability: "exclude filters", .. })
    ));
}

#[test]
fn filter_on_unknown_field_fails() {
    let db = RemoteDb::in_memory();
    let cars = seed(&db);
    let err = cars
        .filter(&Filter::include(Params::new().with("wheels", 4)))
        .unwrap_err();
    assert!(matches!(err, CoreError::FieldNotFound { .. }));
}

#[test]
fn get_of_field_goes_through_filter() {
    let db = RemoteDb::in_memory();
    let cars = seed(&db);
    let bmw = cars.get_of_field("model", &Value::from("BMW")).unwrap();
    assert_eq!(bmw.color, "white");
    assert!(cars
        .get_of_field("model", &Value::from("Lada"))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn delete_is_idempotent_and_evicts() {
    let db = RemoteDb::in_memory();
    let cars = seed(&db);
    let manager = cars.manager();
    let first = manager.all().unwrap().remove(0);
    assert_eq!(manager.len(), 3);

    first.delete(&cars).unwrap();
    cars.delete(&first.id()).unwrap();
    assert_eq!(manager.len(), 2);
    assert_eq!(cars.count().unwrap(), 2);
}

#[test]
fn delete_all_twice_on_empty_collection() {
    let db = RemoteDb::in_memory();
    let cars = db.collection("car", Car::default());
    cars.delete_all().unwrap();
    assert_eq!(cars.count().unwrap(), 0);
    cars.delete_all().unwrap();
    assert_eq!(cars.count().unwrap(), 0);
}

#[test]
fn delete_all_attempts_every_record_and_aggregates_failures() {
    let (api, db) = scripted();
    let cars = seed(&db);
    let stuck = cars.all().unwrap().remove(1);
    api.failing_deletes.lock().insert(stuck.id.clone());

    let err = cars.delete_all().unwrap_err();
    match err {
        CoreError::DeleteAllIncomplete {
            attempted, failures, ..
        } => {
            assert_eq!(attempted, 3);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, stuck.id);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(api.inner.len("car"), 1);
}

#[test]
fn partial_delete_all_keeps_survivors_cached() {
    let (api, db) = scripted();
    let cars = seed(&db);
    let manager = cars.manager();
    manager.preload().unwrap();
    let all = manager.all().unwrap();
    let stuck = all[1].clone();
    api.failing_deletes.lock().insert(stuck.id.clone());

    assert!(cars.delete_all().is_err());
    assert_eq!(manager.mode(), CacheMode::Instance);
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.get(&stuck.id()).unwrap(), stuck);
    assert!(manager.get(&all[0].id()).unwrap_err().is_not_found());
    assert_eq!(manager.all().unwrap(), vec![stuck]);

    api.failing_deletes.lock().clear();
    cars.delete_all().unwrap();
    assert!(manager.is_empty());
    assert_eq!(manager.mode(), CacheMode::Instance);
}

#[test]
fn collections_on_one_handle_share_their_cache() {
    let db = RemoteDb::in_memory();
    let writer = seed(&db);
    let reader = db.clone().collection("car", Car::default());
    let view = reader.manager();
    view.preload().unwrap();
    assert_eq!(view.len(), 3);

    let gone = view.all().unwrap().remove(0);
    writer.delete(&gone.id()).unwrap();
    assert!(view.get(&gone.id()).unwrap_err().is_not_found());
    assert_eq!(view.all().unwrap().len(), 2);

    let mut car = Car::new("Lada", "grey", "Samara");
    car.save(&writer).unwrap();
    assert_eq!(view.get(&car.id()).unwrap(), car);

    let other = RemoteDb::in_memory().collection("car", Car::default());
    assert!(other.manager().is_empty());
}

#[test]
fn identifier_write_back_failure_reports_created_id() {
    let db = RemoteDb::in_memory();
    let badges = db.collection("badge", Badge::default());
    let mut badge = Badge {
        id: 0,
        label: "gold".into(),
    };

    match badge.save(&badges).unwrap_err() {
        CoreError::IdentifierWriteBack { id, source, .. } => {
            assert_eq!(id.len(), tabula_remote::ID_LENGTH);
            assert!(matches!(*source, CoreError::TypeMismatch { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(badges.count().unwrap(), 1);
}

#[test]
fn transport_failures_keep_context_and_leave_cache_alone() {
    let (api, db) = scripted();
    let cars = seed(&db);
    let manager = cars.manager();
    manager.preload().unwrap();

    *api.down.lock() = true;
    let mut car = manager.all().unwrap().remove(0);
    let original = car.color.clone();
    car.color = "blue".into();
    let err = car.save(&cars).unwrap_err();
    assert!(matches!(err, CoreError::Remote { .. }));
    assert!(err.to_string().contains("updating record in car"));

    assert_eq!(manager.get(&car.id()).unwrap().color, original);
    assert_eq!(manager.mode(), CacheMode::Instance);
}

#[test]
fn references_resolve_through_the_database_handle() {
    let db = RemoteDb::in_memory();
    let cars = seed(&db);
    let trips = db.collection("trip", Trip::default());
    let car = cars.all().unwrap().remove(2);

    let mut trip = Trip {
        car_id: car.id.clone(),
        ..Trip::default()
    };
    trip.save(&trips).unwrap();

    let loaded = trips.get(&trip.id()).unwrap();
    assert_eq!(loaded.car, Some(car));
}
