//! Read one key from a store.

use kivi_core::{Config, Store};
use std::error::Error;
use std::path::Path;

pub fn run(path: &Path, key: &str) -> Result<(), Box<dyn Error>> {
    let store = Store::open_with_config(path, Config::default().create_if_missing(false))?;
    let value = store.get(key.as_bytes())?;
    println!("{}", String::from_utf8_lossy(&value));
    Ok(())
}
