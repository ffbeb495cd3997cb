//! Offline integrity check: decode every record and re-check its hash.

use kivi_core::{data_files, Record};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

pub fn run(path: &Path) -> Result<(), Box<dyn Error>> {
    let mut files = 0usize;
    let mut records = 0usize;
    let mut mismatches = 0usize;

    for file_path in data_files(path)? {
        files += 1;
        let mut reader = BufReader::new(File::open(&file_path)?);
        while let Some((record, _)) = Record::read_from(&mut reader)? {
            records += 1;
            if !record.verify() {
                mismatches += 1;
                eprintln!(
                    "hash mismatch in {} for key {:?}",
                    file_path.display(),
                    String::from_utf8_lossy(&record.key)
                );
            }
        }
        info!(file = %file_path.display(), records, "scanned");
    }

    println!("{files} files, {records} records, {mismatches} hash mismatches");
    if mismatches > 0 {
        return Err("integrity check failed".into());
    }
    Ok(())
}
