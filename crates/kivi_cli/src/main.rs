//! Kivi CLI
//!
//! Command-line tools for Kivi store management.
//!
//! # Commands
//!
//! - `get` / `put` - Read or write a single key
//! - `inspect` - Display store statistics
//! - `verify` - Re-read every record and check its integrity hash
//! - `compact` - Collapse live keys into a single sealed segment

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Kivi command-line store tools.
#[derive(Parser)]
#[command(name = "kivi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
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
    /// Read the value stored under a key
    Get {
        /// Key to look up
        key: String,
    },

    /// Write a value under a key
    Put {
        /// Key to write
        key: String,

        /// Value to store
        value: String,

        /// Maximum active-segment size in bytes before rotation
        #[arg(short, long, default_value_t = 256 * 1024 * 1024)]
        max_segment_size: u64,
    },

    /// Display store statistics
    Inspect,

    /// Re-read every record on disk and check its integrity hash
    Verify,

    /// Collapse all live keys into a single sealed segment
    Compact,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("Kivi CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("Kivi Core v{}", kivi_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or("store path required (--path)")?;
    match cli.command {
        Commands::Get { key } => commands::get::run(&path, &key)?,
        Commands::Put {
            key,
            value,
            max_segment_size,
        } => commands::put::run(&path, &key, &value, max_segment_size)?,
        Commands::Inspect => commands::inspect::run(&path)?,
        Commands::Verify => commands::verify::run(&path)?,
        Commands::Compact => commands::compact::run(&path)?,
        Commands::Version => unreachable!(),
    }

    Ok(())
}
