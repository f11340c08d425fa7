//! Dump command implementation.

use super::{CommandResult, Format};
use serde::Serialize;
use serde_json::Value as Json;
use std::io::Write;
use tabula_core::Db;

/// A dumped record.
#[derive(Debug, Serialize)]
pub struct DumpedRecord {
    /// Record identifier.
    pub id: u64,
    /// The stored document; text that is not JSON is kept as a string.
    pub record: Json,
}

/// Runs the dump command.
pub fn run(
    db: &Db,
    bucket: &str,
    limit: Option<usize>,
    format: Format,
    out: &mut impl Write,
) -> CommandResult {
    let entries = db.existing(bucket)?.scan()?;
    let total = entries.len();
    let shown = limit.unwrap_or(total).min(total);

    match format {
        Format::Json => {
            let records: Vec<DumpedRecord> = entries
                .into_iter()
                .take(shown)
                .map(|(id, raw)| DumpedRecord {
                    id,
                    record: serde_json::from_str(&raw).unwrap_or(Json::String(raw)),
                })
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?;
        }
        Format::Text => {
            for (id, raw) in entries.into_iter().take(shown) {
                writeln!(out, "{id:>8}  {raw}")?;
            }
            if shown < total {
                writeln!(out, "... {} more", total - shown)?;
            }
        }
    }
    Ok(())
}
