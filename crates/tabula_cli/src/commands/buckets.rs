//! Bucket listing commands.

use super::{CommandResult, Format};
use serde::Serialize;
use std::io::Write;
use tabula_core::Db;

/// One line of the bucket listing.
#[derive(Debug, Serialize)]
pub struct BucketSummary {
    /// Bucket name.
    pub name: String,
    /// Number of records, counter cell excluded.
    pub records: u64,
    /// Identifier the next new record would receive.
    pub next_id: u64,
}

/// Collects a summary of every bucket, in name order.
pub fn summarize(db: &Db) -> Result<Vec<BucketSummary>, Box<dyn std::error::Error>> {
    let mut summaries = Vec::new();
    for name in db.bucket_names()? {
        let bucket = db.existing(&name)?;
        summaries.push(BucketSummary {
            records: bucket.count()?,
            next_id: bucket.next_id()?,
            name,
        });
    }
    Ok(summaries)
}

/// Runs the buckets command.
pub fn list(db: &Db, format: Format, out: &mut impl Write) -> CommandResult {
    let summaries = summarize(db)?;
    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&summaries)?)?,
        Format::Text => {
            if summaries.is_empty() {
                writeln!(out, "(no buckets)")?;
            }
            for s in &summaries {
                writeln!(out, "{:<24} {:>8} records  next id {}", s.name, s.records, s.next_id)?;
            }
        }
    }
    Ok(())
}

/// Runs the count command.
pub fn count(db: &Db, bucket: &str, out: &mut impl Write) -> CommandResult {
    writeln!(out, "{}", db.existing(bucket)?.count()?)?;
    Ok(())
}
