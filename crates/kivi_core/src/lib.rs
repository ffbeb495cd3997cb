//! # Kivi Core
//!
//! A single-writer, append-only, log-structured key-value store.
//!
//! Records are appended to an active segment file (`current-data`) and
//! located through an in-memory hash index mapping each key to the file and
//! byte offset of its latest record. When the active segment outgrows its
//! limit it is sealed under the next `segment-N` name and a fresh one is
//! started. Compaction collapses every live key into a single sealed
//! segment and discards the rest. Every value carries a SHA-1 hash that is
//! re-checked on each read.
//!
//! The index is rebuilt at open by scanning all segments oldest-first, so
//! the last write wins; a crash mid-append costs at most the unfinished
//! record.
//!
//! ```no_run
//! use kivi_core::Store;
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("data"), 10 * 1024 * 1024)?;
//! store.put(b"team", b"blue")?;
//! assert_eq!(store.get(b"team")?, b"blue");
//! # Ok::<(), kivi_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod index;
mod record;
mod segment;
mod store;

pub use config::Config;
pub use dir::data_files;
pub use error::{StoreError, StoreResult};
pub use index::RecordRef;
pub use record::{value_hash, Record};
pub use store::{Store, StoreStats};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
