//! File-backed persistence for Loom.

pub mod paths;
pub mod storage;
pub mod toml_settings_repository;
pub mod toml_workspace_repository;

pub use crate::paths::{CONFIG_DIR_ENV, LoomPaths, PathError};
pub use crate::storage::{KeyedTomlStorage, SETTINGS_KEY, StorageError, WORKSPACE_KEY};
pub use crate::toml_settings_repository::TomlSettingsRepository;
pub use crate::toml_workspace_repository::TomlWorkspaceRepository;
