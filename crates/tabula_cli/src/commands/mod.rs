//! CLI command implementations.
//!
//! Every command writes its report to the given writer so it can be
//! checked without a terminal.

pub mod buckets;
pub mod compact;
pub mod dump;
pub mod records;
pub mod stats;

use clap::ValueEnum;
use std::path::Path;
use tabula_core::{Config, Db};

/// Boxed error returned by commands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable lines.
    Text,
    /// One JSON document.
    Json,
}

/// Opens an existing store file.
pub fn open(path: &Path) -> Result<Db, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(Db::open(path, Config::new().create_if_missing(false))?)
}

#[cfg(test)]
pub(crate) mod testing {
    use tabula_core::{Config, Db};
    use tempfile::TempDir;

    /// A file store with a `car` bucket holding three records.
    pub fn store() -> (TempDir, Db) {
        let dir = TempDir::new().unwrap();
        let db = Db::open(dir.path().join("cli.tbl"), Config::default()).unwrap();
        let cars = db.raw("car").unwrap();
        cars.set_raw(1, r#"{"id":1,"model":"Tesla"}"#).unwrap();
        cars.set_raw(2, r#"{"id":2,"model":"BMW"}"#).unwrap();
        cars.set_raw(3, r#"{"id":3,"model":"Lada"}"#).unwrap();
        db.raw("empty").unwrap();
        (dir, db)
    }

    pub fn output(run: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut out = Vec::new();
        run(&mut out);
        String::from_utf8(out).unwrap()
    }
}
