//! Single-record and bucket-clearing commands.

use super::CommandResult;
use std::io::Write;
use tabula_core::Db;
use tracing::info;

/// Runs the get command.
pub fn get(db: &Db, bucket: &str, id: u64, out: &mut impl Write) -> CommandResult {
    let raw = db.existing(bucket)?.get_raw(id)?;
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(doc) => writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?,
        Err(_) => writeln!(out, "{raw}")?,
    }
    Ok(())
}

/// Runs the delete command.
pub fn delete(db: &Db, bucket: &str, id: u64, out: &mut impl Write) -> CommandResult {
    db.existing(bucket)?.delete(id)?;
    info!(bucket, id, "deleted record");
    writeln!(out, "Deleted {bucket}/{id}")?;
    Ok(())
}

/// Runs the clear command.
pub fn clear(db: &Db, bucket: &str, out: &mut impl Write) -> CommandResult {
    let raw = db.existing(bucket)?;
    let removed = raw.count()?;
    raw.clear()?;
    info!(bucket, removed, "cleared bucket");
    writeln!(out, "Cleared {bucket}: {removed} records removed")?;
    Ok(())
}
