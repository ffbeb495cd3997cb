//! Segment set: the active append target and the ordered sealed list.

use crate::dir::StoreDir;
use crate::error::StoreResult;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Opens a segment file for appending, creating it if missing.
pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().append(true).create(true).open(path)
}

/// Owns the active segment's file handle and append offset, plus the
/// ordered list of sealed segment paths.
///
/// Mutation runs under the store's writer lock; the set itself does no
/// locking.
#[derive(Debug)]
pub struct SegmentSet {
    active: File,
    active_path: PathBuf,
    active_offset: u64,
    sealed: Vec<PathBuf>,
}

impl SegmentSet {
    /// Opens the active segment in append mode with an empty sealed list.
    ///
    /// Recovery fills in the sealed list and the real append offset after
    /// scanning the directory.
    pub fn open(dir: &StoreDir) -> StoreResult<Self> {
        let active_path = dir.current_path();
        let active = open_append(&active_path)?;
        Ok(Self {
            active,
            active_path,
            active_offset: 0,
            sealed: Vec::new(),
        })
    }

    /// Returns the active segment's path.
    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    /// Returns the current append offset.
    pub fn active_offset(&self) -> u64 {
        self.active_offset
    }

    /// Adopts the append offset found by a recovery scan.
    pub fn set_active_offset(&mut self, offset: u64) {
        self.active_offset = offset;
    }

    /// Returns the sealed segment paths, oldest first.
    pub fn sealed(&self) -> &[PathBuf] {
        &self.sealed
    }

    /// Adopts the sealed list found by a recovery scan.
    pub fn set_sealed(&mut self, sealed: Vec<PathBuf>) {
        self.sealed = sealed;
    }

    /// Whether appending `len` more bytes would push the active segment
    /// past `max`.
    pub fn would_overflow(&self, len: u64, max: u64) -> bool {
        self.active_offset + len > max
    }

    /// Appends `data` to the active segment and returns the offset at which
    /// it begins. A short write is an error.
    ///
    /// The append offset is NOT advanced here; the store calls [`advance`]
    /// after publishing the index entry, so both move under one index lock.
    ///
    /// [`advance`]: SegmentSet::advance
    pub fn write(&mut self, data: &[u8]) -> StoreResult<u64> {
        self.active.write_all(data)?;
        Ok(self.active_offset)
    }

    /// Advances the append offset past a completed write.
    pub fn advance(&mut self, len: u64) {
        self.active_offset += len;
    }

    /// Seals the active segment under the next ordinal and starts a fresh
    /// empty one. Returns the sealed path.
    ///
    /// The next ordinal is `len(sealed) + 1` at the time of rotation.
    pub fn rotate(&mut self, dir: &StoreDir) -> StoreResult<PathBuf> {
        let sealed_path = dir.segment_path(self.sealed.len() + 1);
        std::fs::rename(&self.active_path, &sealed_path)?;
        self.active = open_append(&self.active_path)?;
        self.active_offset = 0;
        self.sealed.push(sealed_path.clone());
        Ok(sealed_path)
    }

    /// Replaces the whole set after compaction: a fresh active file at
    /// offset zero and a new sealed list.
    pub fn install(&mut self, active: File, sealed: Vec<PathBuf>) {
        self.active = active;
        self.active_offset = 0;
        self.sealed = sealed;
    }

    /// Fsyncs the active segment.
    pub fn sync(&self) -> StoreResult<()> {
        self.active.sync_all()?;
        Ok(())
    }

    /// Returns the active segment's on-disk size.
    pub fn file_size(&self) -> StoreResult<u64> {
        Ok(self.active.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_returns_pre_write_offset() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        let mut set = SegmentSet::open(&dir).unwrap();

        let offset = set.write(b"hello").unwrap();
        assert_eq!(offset, 0);
        // Offset only moves on advance.
        assert_eq!(set.active_offset(), 0);
        set.advance(5);

        let offset = set.write(b" world").unwrap();
        assert_eq!(offset, 5);
        set.advance(6);
        assert_eq!(set.active_offset(), 11);
        assert_eq!(set.file_size().unwrap(), 11);
    }

    #[test]
    fn rotate_seals_and_resets() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        let mut set = SegmentSet::open(&dir).unwrap();

        set.write(b"data").unwrap();
        set.advance(4);

        let sealed = set.rotate(&dir).unwrap();
        assert_eq!(sealed, dir.segment_path(1));
        assert_eq!(std::fs::read(&sealed).unwrap(), b"data");
        assert_eq!(set.active_offset(), 0);
        assert_eq!(set.file_size().unwrap(), 0);
        assert_eq!(set.sealed(), [sealed]);
    }

    #[test]
    fn rotation_ordinals_increment() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        let mut set = SegmentSet::open(&dir).unwrap();

        let first = set.rotate(&dir).unwrap();
        let second = set.rotate(&dir).unwrap();
        assert_eq!(first, dir.segment_path(1));
        assert_eq!(second, dir.segment_path(2));
    }

    #[test]
    fn would_overflow_is_strict() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        let mut set = SegmentSet::open(&dir).unwrap();
        set.set_active_offset(90);

        // Landing exactly on the limit does not overflow.
        assert!(!set.would_overflow(10, 100));
        assert!(set.would_overflow(11, 100));
    }
}
