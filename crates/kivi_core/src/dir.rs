//! Store directory management.
//!
//! File system layout:
//!
//! ```text
//! <dir>/
//! ├─ LOCK                  # advisory lock, one store instance at a time
//! ├─ current-data          # active segment, sole append target
//! ├─ segment-1 … segment-N # sealed segments, immutable
//! └─ segment-compacting    # transient compaction output
//! ```
//!
//! Sealed segments are enumerated in ordinal order (parsed from the file
//! name, not lexicographic), so recovery stays correct past nine segments.
//! Files that don't match a store name are ignored.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const CURRENT_FILE: &str = "current-data";
const SEGMENT_PREFIX: &str = "segment-";
const COMPACTING_FILE: &str = "segment-compacting";

/// Manages the store directory structure and file locking.
///
/// Holds an exclusive advisory lock for its lifetime; only one `StoreDir`
/// can exist per directory at a time across processes.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and acquires its lock.
    ///
    /// A stale `segment-compacting` file left behind by a compaction that
    /// crashed before its rename commit point is removed here.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store directory does not exist: {}", path.display()),
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::StoreLocked);
        }

        let dir = Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        };

        // Anything under the compacting name predates the rename commit
        // point and holds no committed data.
        let stale = dir.compacting_path();
        if stale.exists() {
            fs::remove_file(&stale)?;
        }

        Ok(dir)
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the active segment.
    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        self.path.join(CURRENT_FILE)
    }

    /// Returns the path of a sealed segment by ordinal.
    #[must_use]
    pub fn segment_path(&self, ordinal: usize) -> PathBuf {
        self.path.join(format!("{SEGMENT_PREFIX}{ordinal}"))
    }

    /// Returns the path of the transient compaction target.
    #[must_use]
    pub fn compacting_path(&self) -> PathBuf {
        self.path.join(COMPACTING_FILE)
    }

    /// Enumerates sealed segment files, sorted by parsed ordinal.
    pub fn sealed_segments(&self) -> StoreResult<Vec<PathBuf>> {
        sealed_segments_in(&self.path)
    }

    /// Syncs the directory so renames and removals are durable.
    ///
    /// On Unix, fsync on a directory syncs its entries. Windows NTFS
    /// journals metadata operations, so the explicit fsync is skipped.
    #[cfg(unix)]
    pub fn sync_directory(&self) -> StoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn sync_directory(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Lists the data files of a store directory without taking the lock:
/// sealed segments in ordinal order, then the active segment when present.
///
/// Intended for offline tooling that reads a directory it doesn't own.
pub fn data_files(path: &Path) -> StoreResult<Vec<PathBuf>> {
    let mut files = sealed_segments_in(path)?;
    let current = path.join(CURRENT_FILE);
    if current.exists() {
        files.push(current);
    }
    Ok(files)
}

fn sealed_segments_in(path: &Path) -> StoreResult<Vec<PathBuf>> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(suffix) = name.strip_prefix(SEGMENT_PREFIX) else {
            continue;
        };
        // Only numeric suffixes name sealed segments; this also skips
        // `segment-compacting`.
        let Ok(ordinal) = suffix.parse::<u64>() else {
            continue;
        };
        found.push((ordinal, entry.path()));
    }
    found.sort_by_key(|&(ordinal, _)| ordinal);
    Ok(found.into_iter().map(|(_, path)| path).collect())
}
