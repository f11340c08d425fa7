//! Stats command implementation.

use super::buckets::{summarize, BucketSummary};
use super::{CommandResult, Format};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tabula_core::Db;

/// Store statistics report.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    /// Store file path.
    pub path: String,
    /// Log size in bytes.
    pub log_size: u64,
    /// Last committed transaction id.
    pub last_txid: u64,
    /// Number of live entries, counter cells included.
    pub entries: usize,
    /// Per-bucket summaries.
    pub buckets: Vec<BucketSummary>,
}

/// Runs the stats command.
pub fn run(db: &Db, path: &Path, format: Format, out: &mut impl Write) -> CommandResult {
    let stats = db.stats()?;
    let report = StatsReport {
        path: path.display().to_string(),
        log_size: stats.log_size,
        last_txid: stats.last_txid,
        entries: stats.entries,
        buckets: summarize(db)?,
    };

    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?,
        Format::Text => {
            writeln!(out, "Store: {}", report.path)?;
            writeln!(out, "  Log size:   {} bytes", report.log_size)?;
            writeln!(out, "  Last txid:  {}", report.last_txid)?;
            writeln!(out, "  Entries:    {}", report.entries)?;
            writeln!(out, "  Buckets:    {}", report.buckets.len())?;
            for b in &report.buckets {
                writeln!(out, "    {}: {} records", b.name, b.records)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{output, store};

    #[test]
    fn json_report_counts_buckets() {
        let (dir, db) = store();
        let json = output(|out| run(&db, dir.path(), Format::Json, out).unwrap());
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["buckets"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["entries"], 3);
        assert!(parsed["log_size"].as_u64().unwrap() > 0);
    }

    #[test]
    fn text_report_lists_buckets() {
        let (dir, db) = store();
        let text = output(|out| run(&db, dir.path(), Format::Text, out).unwrap());
        assert!(text.contains("Buckets:    2"));
        assert!(text.contains("car: 3 records"));
    }
}
