use serde::{Serialize, de::DeserializeOwned};

use super::atomic_toml::AtomicTomlFile;
use crate::paths::LoomPaths;

/// Storage key of the workspace snapshot.
pub const WORKSPACE_KEY: &str = "data-loom-workspace";
/// Storage key of the settings.
pub const SETTINGS_KEY: &str = "data-loom-settings";

/// Maps storage keys to TOML files under one directory.
#[derive(Debug, Clone)]
pub struct KeyedTomlStorage {
    paths: LoomPaths,
}

impl KeyedTomlStorage {
    pub fn new(paths: LoomPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &LoomPaths {
        &self.paths
    }

    pub fn file<T>(&self, key: &str) -> AtomicTomlFile<T>
    where
        T: Serialize + DeserializeOwned,
    {
        AtomicTomlFile::new(self.paths.file_for_key(key))
    }
}
