//! In-memory key index.

use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::HashMap;
use std::path::PathBuf;

/// Location of the latest record for a key: a segment file path and the
/// byte offset at which the record begins.
///
/// Deliberately a value, not a handle into live memory — it stays
/// meaningful across restarts and across compaction's file renames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    /// Segment file containing the record.
    pub file: PathBuf,
    /// Byte offset of the record's size prefix within the file.
    pub offset: u64,
}

/// Key → latest record location, shared for reads, exclusive for writes.
///
/// Lookups never block each other; the writer holds the exclusive side only
/// while publishing an entry, never during disk I/O.
#[derive(Debug, Default)]
pub struct KeyIndex {
    entries: RwLock<HashMap<Vec<u8>, RecordRef>>,
}

impl KeyIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the latest record location for a key.
    pub fn get(&self, key: &[u8]) -> Option<RecordRef> {
        self.entries.read().get(key).cloned()
    }

    /// Returns the number of live keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clones all entries, for compaction's rewrite pass.
    pub fn snapshot(&self) -> Vec<(Vec<u8>, RecordRef)> {
        self.entries
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Takes the exclusive lock, so a caller can publish an index entry
    /// together with other writer state in one critical section.
    pub fn lock_exclusive(&self) -> RwLockWriteGuard<'_, HashMap<Vec<u8>, RecordRef>> {
        self.entries.write()
    }

    /// Replaces the whole mapping in one step (recovery install and
    /// compaction swap).
    pub fn replace(&self, entries: HashMap<Vec<u8>, RecordRef>) {
        *self.entries.write() = entries;
    }
}
