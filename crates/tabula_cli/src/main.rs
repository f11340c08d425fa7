//! Tabula CLI
//!
//! Command-line tools for inspecting and maintaining Tabula bucket stores.
//!
//! # Commands
//!
//! - `buckets` - List buckets with their record counts
//! - `count` - Count the records of one bucket
//! - `dump` - Print the records of one bucket
//! - `get` / `delete` - Read or remove one record
//! - `clear` - Remove every record of a bucket
//! - `compact` - Rewrite the log with live data only
//! - `stats` - Display store statistics

mod commands;

use clap::{Parser, Subcommand};
use commands::Format;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tabula command-line store tools.
#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List buckets with their record counts
    Buckets {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Count the records of a bucket
    Count {
        /// Bucket name
        bucket: String,
    },

    /// Print the records of a bucket in identifier order
    Dump {
        /// Bucket name
        bucket: String,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print one record
    Get {
        /// Bucket name
        bucket: String,

        /// Record identifier
        id: u64,
    },

    /// Delete one record
    Delete {
        /// Bucket name
        bucket: String,

        /// Record identifier
        id: u64,
    },

    /// Delete every record of a bucket and reset its identifier counter
    Clear {
        /// Bucket name
        bucket: String,
    },

    /// Rewrite the log with live data only
    Compact,

    /// Display store statistics
    Stats {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so dumps stay machine-readable.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("Tabula CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("Tabula Core v{}", tabula_core::VERSION);
        println!("Log format v{}", tabula_storage::LOG_VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or("Store path required (--path)")?;
    let db = commands::open(&path)?;
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Buckets { format } => commands::buckets::list(&db, format, &mut out)?,
        Commands::Count { bucket } => commands::buckets::count(&db, &bucket, &mut out)?,
        Commands::Dump {
            bucket,
            limit,
            format,
        } => commands::dump::run(&db, &bucket, limit, format, &mut out)?,
        Commands::Get { bucket, id } => commands::records::get(&db, &bucket, id, &mut out)?,
        Commands::Delete { bucket, id } => commands::records::delete(&db, &bucket, id, &mut out)?,
        Commands::Clear { bucket } => commands::records::clear(&db, &bucket, &mut out)?,
        Commands::Compact => commands::compact::run(&db, &mut out)?,
        Commands::Stats { format } => commands::stats::run(&db, &path, format, &mut out)?,
        Commands::Version => {}
    }

    db.close()?;
    Ok(())
}
