//! Write one key to a store.

use kivi_core::{Config, Store};
use std::error::Error;
use std::path::Path;

pub fn run(
    path: &Path,
    key: &str,
    value: &str,
    max_segment_size: u64,
) -> Result<(), Box<dyn Error>> {
    let config = Config::default().max_segment_size(max_segment_size);
    let store = Store::open_with_config(path, config)?;
    store.put(key.as_bytes(), value.as_bytes())?;
    store.close()?;
    println!("stored {key} ({} bytes)", value.len());
    Ok(())
}
