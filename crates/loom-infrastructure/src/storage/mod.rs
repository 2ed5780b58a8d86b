//! Keyed TOML storage.

mod atomic_toml;
mod keyed;

pub use atomic_toml::{AtomicTomlFile, StorageError};
pub use keyed::{KeyedTomlStorage, SETTINGS_KEY, WORKSPACE_KEY};
