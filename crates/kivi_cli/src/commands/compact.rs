//! Compact a store in place.

use kivi_core::{Config, Store};
use std::error::Error;
use std::path::Path;

pub fn run(path: &Path) -> Result<(), Box<dyn Error>> {
    let store = Store::open_with_config(path, Config::default().create_if_missing(false))?;

    let before = store.stats()?;
    store.compact()?;
    let after = store.stats()?;

    println!(
        "compacted {} keys: {} -> {} sealed segments",
        after.keys, before.sealed_segments, after.sealed_segments
    );
    store.close()?;
    Ok(())
}
