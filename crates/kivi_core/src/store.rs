//! Store facade: open and recovery, concurrent reads, serialized writes,
//! and online compaction.
//!
//! All mutation (put, rotation, compaction) runs under a single writer
//! lock, one operation at a time; reads share the index lock and never
//! touch the writer lock, so gets proceed while a put is appending.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::index::{KeyIndex, RecordRef};
use crate::record::{value_hash, Record};
use crate::segment::{open_append, SegmentSet};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info};

/// Counters describing the current shape of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of live keys in the index.
    pub keys: usize,
    /// Number of sealed segment files.
    pub sealed_segments: usize,
    /// On-disk size of the active segment in bytes.
    pub active_size: u64,
}

/// A directory-rooted, append-only key-value store.
///
/// Values are written to an active segment file and located through an
/// in-memory index rebuilt at open. Superseded records are reclaimed by
/// [`compact`], which collapses all live keys into a single sealed segment.
///
/// # Example
///
/// ```no_run
/// use kivi_core::Store;
/// use std::path::Path;
///
/// let store = Store::open(Path::new("my_store"), 10 * 1024 * 1024)?;
/// store.put(b"greeting", b"hello")?;
/// assert_eq!(store.get(b"greeting")?, b"hello");
/// store.close()?;
/// # Ok::<(), kivi_core::StoreError>(())
/// ```
///
/// [`compact`]: Store::compact
pub struct Store {
    config: Config,
    dir: StoreDir,
    /// Single-writer slot: put, rotation, and compaction all run under this
    /// lock, so writes are totally ordered and never concurrent.
    segments: Mutex<SegmentSet>,
    index: KeyIndex,
    is_open: RwLock<bool>,
}

impl Store {
    /// Opens or creates a store with the given segment size limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory lock is held elsewhere
    /// (`StoreLocked`), if recovery finds a damaged record (`Corruption`),
    /// or on I/O failure. No store is returned on a recovery error.
    pub fn open(path: &Path, max_segment_size: u64) -> StoreResult<Self> {
        Self::open_with_config(path, Config::default().max_segment_size(max_segment_size))
    }

    /// Opens or creates a store with custom configuration.
    pub fn open_with_config(path: &Path, config: Config) -> StoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let mut set = SegmentSet::open(&dir)?;
        let index = KeyIndex::new();
        recover(&dir, &mut set, &index)?;

        info!(
            path = %path.display(),
            keys = index.len(),
            sealed = set.sealed().len(),
            active_offset = set.active_offset(),
            "store opened"
        );

        Ok(Self {
            config,
            dir,
            segments: Mutex::new(set),
            index,
            is_open: RwLock::new(true),
        })
    }

    /// Reads the latest value written for a key.
    ///
    /// The record is decoded from disk, its key is checked against the
    /// index entry, and its stored hash is checked against a recomputed
    /// SHA-1 of the value before the value is returned.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the key has never been written
    /// - `IntegrityMismatch` if the stored bytes fail the hash check
    /// - `Corruption` / `Io` on decode or filesystem failure
    pub fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.ensure_open()?;
        let Some(mut entry) = self.index.get(key) else {
            return Err(StoreError::NotFound);
        };

        // A rotation or compaction can rename or remove the referenced file
        // between the index lookup and the read. The index is rewired under
        // its exclusive lock whenever that happens, so a failed read whose
        // entry has since changed just retries against the new location; an
        // unchanged entry means the damage is real.
        loop {
            match read_verified(key, &entry) {
                Ok(value) => return Ok(value),
                Err(err) if is_retryable(&err) => match self.index.get(key) {
                    Some(latest) if latest != entry => entry = latest,
                    _ => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Writes a value under a key.
    ///
    /// Rotates the active segment first when this record would push it past
    /// the configured limit; a rotation failure is returned and leaves the
    /// index unchanged. Once the bytes are appended, the index entry and
    /// the advanced append offset are published together under the index's
    /// exclusive lock.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }

        let record = Record::new(key, value);
        let data = record.encode();

        let mut set = self.segments.lock();
        if set.would_overflow(data.len() as u64, self.config.max_segment_size) {
            // Rename first with no index lock held, then take the exclusive
            // lock only for the in-memory rewrite: records that lived in the
            // active file keep valid references once it is sealed under its
            // new name, and readers never wait on the rename itself.
            let sealed = set.rotate(&self.dir)?;
            let mut entries = self.index.lock_exclusive();
            for entry in entries.values_mut() {
                if entry.file.as_path() == set.active_path() {
                    entry.file.clone_from(&sealed);
                }
            }
            drop(entries);
            debug!(segment = %sealed.display(), "rotated active segment");
        }

        let offset = set.write(&data)?;
        if self.config.sync_on_put {
            set.sync()?;
        }

        let mut entries = self.index.lock_exclusive();
        entries.insert(
            key.to_vec(),
            RecordRef {
                file: set.active_path().to_path_buf(),
                offset,
            },
        );
        set.advance(data.len() as u64);
        Ok(())
    }

    /// Collapses all live keys into a single new sealed segment and
    /// discards every prior segment.
    ///
    /// Holds the writer lock for the whole operation, so concurrent puts
    /// queue behind it. Each live value is re-read through the normal read
    /// path (hash check included), rewritten into `segment-compacting`, and
    /// the temporary file is synced and renamed to the next ordinal — the
    /// commit point — before any old file is deleted. A read failure aborts
    /// the whole compaction; dropping the entry instead would lose the key.
    ///
    /// On success the directory holds exactly one sealed segment and an
    /// empty active segment, and every pre-compaction key reads back its
    /// latest value.
    pub fn compact(&self) -> StoreResult<()> {
        self.ensure_open()?;
        let mut set = self.segments.lock();

        let tmp_path = self.dir.compacting_path();
        let mut tmp = File::create(&tmp_path)?;

        let mut rewritten: HashMap<Vec<u8>, u64> = HashMap::new();
        let mut offset = 0u64;
        for (key, entry) in self.index.snapshot() {
            let value = read_verified(&key, &entry)?;
            let fresh = Record::new(key.clone(), value);
            let data = fresh.encode();
            tmp.write_all(&data)?;
            rewritten.insert(key, offset);
            offset += data.len() as u64;
        }
        tmp.sync_all()?;
        drop(tmp);

        // Rename is the commit point; deletions only happen after it.
        let old_sealed = set.sealed().to_vec();
        let compacted_path = self.dir.segment_path(old_sealed.len() + 1);
        fs::rename(&tmp_path, &compacted_path)?;

        // Swap the index before touching the old files, so readers are
        // never directed at a segment that is about to disappear.
        let entries: HashMap<Vec<u8>, RecordRef> = rewritten
            .into_iter()
            .map(|(key, offset)| {
                (
                    key,
                    RecordRef {
                        file: compacted_path.clone(),
                        offset,
                    },
                )
            })
            .collect();
        let keys = entries.len();
        self.index.replace(entries);

        for path in &old_sealed {
            fs::remove_file(path)?;
        }
        fs::remove_file(set.active_path())?;
        self.dir.sync_directory()?;

        let active = open_append(&self.dir.current_path())?;
        set.install(active, vec![compacted_path.clone()]);

        info!(
            segment = %compacted_path.display(),
            keys,
            discarded_segments = old_sealed.len() + 1,
            bytes = offset,
            "compaction complete"
        );
        Ok(())
    }

    /// Returns the active segment's current on-disk size.
    pub fn size(&self) -> StoreResult<u64> {
        self.ensure_open()?;
        self.segments.lock().file_size()
    }

    /// Returns counters describing the store's current shape.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        self.ensure_open()?;
        let set = self.segments.lock();
        Ok(StoreStats {
            keys: self.index.len(),
            sealed_segments: set.sealed().len(),
            active_size: set.file_size()?,
        })
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Flushes the active segment and marks the store closed.
    ///
    /// Closing twice is a no-op; any other operation after close returns
    /// `StoreClosed`. The directory lock is released when the store is
    /// dropped.
    pub fn close(&self) -> StoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.segments.lock().sync()?;
        *is_open = false;
        Ok(())
    }

    /// Whether the store is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(StoreError::StoreClosed)
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.dir.path())
            .field("is_open", &self.is_open())
            .field("keys", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Rebuilds the index by scanning sealed segments in ordinal order, then
/// the active segment. Later records overwrite earlier index entries, so
/// the last write wins. The active file's decoded length becomes the
/// append offset.
fn recover(dir: &StoreDir, set: &mut SegmentSet, index: &KeyIndex) -> StoreResult<()> {
    let sealed = dir.sealed_segments()?;
    let mut entries: HashMap<Vec<u8>, RecordRef> = HashMap::new();

    for path in &sealed {
        scan_file(path, &mut entries)?;
    }
    let active_offset = scan_file(&dir.current_path(), &mut entries)?;

    debug!(
        sealed = sealed.len(),
        keys = entries.len(),
        active_offset,
        "recovery scan finished"
    );

    set.set_sealed(sealed);
    set.set_active_offset(active_offset);
    index.replace(entries);
    Ok(())
}

/// Scans one segment file from the start, recording each record's starting
/// offset. Returns the offset at which the clean end-of-stream was hit.
fn scan_file(path: &Path, entries: &mut HashMap<Vec<u8>, RecordRef>) -> StoreResult<u64> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut offset = 0u64;

    while let Some((record, consumed)) = Record::read_from(&mut reader)? {
        entries.insert(
            record.key,
            RecordRef {
                file: path.to_path_buf(),
                offset,
            },
        );
        offset += consumed as u64;
    }
    Ok(offset)
}

/// Opens a segment file read-only and decodes the record at `offset`.
///
/// Readers open and close their own descriptors; sealed segments are
/// immutable and need no lock.
fn read_record_at(path: &Path, offset: u64) -> StoreResult<Record> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut reader = BufReader::new(file);

    match Record::read_from(&mut reader)? {
        Some((record, _)) => Ok(record),
        None => Err(StoreError::corruption("record offset beyond end of file")),
    }
}

/// Reads the record an index entry points at and checks it end to end:
/// the record's key must equal the indexed key, and its stored hash must
/// match a recomputed SHA-1 of the value.
fn read_verified(key: &[u8], entry: &RecordRef) -> StoreResult<Vec<u8>> {
    let record = read_record_at(&entry.file, entry.offset)?;
    if record.key != key {
        return Err(StoreError::corruption(
            "record key does not match index entry",
        ));
    }
    let computed = value_hash(&record.value);
    if computed != record.hash {
        return Err(StoreError::IntegrityMismatch {
            stored: record.hash,
            computed,
        });
    }
    Ok(record.value)
}

/// Whether a read failure may be explained by the referenced file having
/// been renamed or removed since the index lookup.
fn is_retryable(err: &StoreError) -> bool {
    match err {
        StoreError::Corruption { .. } | StoreError::IntegrityMismatch { .. } => true,
        StoreError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_empty_directory() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), 1000).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.keys, 0);
        assert_eq!(stats.sealed_segments, 0);
        assert_eq!(stats.active_size, 0);
    }

    #[test]
    fn get_unknown_key_is_not_found() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), 1000).unwrap();

        let result = store.get(b"missing");
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[test]
    fn empty_key_rejected() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), 1000).unwrap();

        let result = store.put(b"", b"value");
        assert!(matches!(result, Err(StoreError::EmptyKey)));
    }

    #[test]
    fn operations_after_close_fail() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), 1000).unwrap();
        store.put(b"k", b"v").unwrap();
        store.close().unwrap();

        assert!(matches!(store.get(b"k"), Err(StoreError::StoreClosed)));
        assert!(matches!(
            store.put(b"k", b"v2"),
            Err(StoreError::StoreClosed)
        ));
        assert!(matches!(store.compact(), Err(StoreError::StoreClosed)));
        // Closing again is a no-op.
        store.close().unwrap();
    }

    #[test]
    fn second_open_while_locked_fails() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), 1000).unwrap();

        let result = Store::open(temp.path(), 1000);
        assert!(matches!(result, Err(StoreError::StoreLocked)));

        drop(store);
        Store::open(temp.path(), 1000).unwrap();
    }

    #[test]
    fn size_tracks_appends() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), 10_000).unwrap();
        assert_eq!(store.size().unwrap(), 0);

        store.put(b"k1", b"v1").unwrap();
        let after_one = store.size().unwrap();
        assert!(after_one > 0);

        store.put(b"k2", b"v2").unwrap();
        assert!(store.size().unwrap() > after_one);
    }

    #[test]
    fn oversized_record_gets_own_segment() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), 35).unwrap();

        // Far larger than the limit; accepted after rotation.
        store.put(b"big", vec![7u8; 200].as_slice()).unwrap();
        assert_eq!(store.get(b"big").unwrap(), vec![7u8; 200]);
    }
}
