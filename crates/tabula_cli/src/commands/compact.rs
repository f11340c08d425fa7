//! Compact command implementation.

use super::CommandResult;
use std::io::Write;
use tabula_core::Db;

/// Runs the compact command.
pub fn run(db: &Db, out: &mut impl Write) -> CommandResult {
    let before = db.stats()?.log_size;
    let reclaimed = db.compact()?;
    let after = db.stats()?.log_size;

    writeln!(out, "Compaction complete:")?;
    writeln!(out, "  Size before: {before} bytes")?;
    writeln!(out, "  Size after:  {after} bytes")?;
    writeln!(
        out,
        "  Space saved: {reclaimed} bytes ({:.1}%)",
        if before > 0 {
            reclaimed as f64 / before as f64 * 100.0
        } else {
            0.0
        }
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{output, store};

    #[test]
    fn compaction_shrinks_a_churned_log() {
        let (_dir, db) = store();
        let cars = db.raw("car").unwrap();
        for round in 0..20 {
            cars.set_raw(1, &format!(r#"{{"id":1,"round":{round}}}"#)).unwrap();
        }
        let before = db.stats().unwrap().log_size;

        let text = output(|out| run(&db, out).unwrap());
        assert!(text.contains(&format!("Size before: {before} bytes")));
        assert!(db.stats().unwrap().log_size < before);
        assert_eq!(cars.count().unwrap(), 3);
    }
}
