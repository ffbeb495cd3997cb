//! Display store statistics.

use kivi_core::{Config, Store};
use std::error::Error;
use std::path::Path;

pub fn run(path: &Path) -> Result<(), Box<dyn Error>> {
    let store = Store::open_with_config(path, Config::default().create_if_missing(false))?;
    let stats = store.stats()?;

    println!("Store: {}", path.display());
    println!("  live keys:       {}", stats.keys);
    println!("  sealed segments: {}", stats.sealed_segments);
    println!("  active size:     {} bytes", stats.active_size);
    Ok(())
}
