//! Where Loom keeps its files.
//!
//! ```text
//! <config dir>/loom/
//! ├── data-loom-workspace.toml   # Workspace snapshot
//! └── data-loom-settings.toml    # Settings
//! ```
//!
//! The directory is resolved in this order: an explicit override (the CLI's
//! `--config-dir`), the `LOOM_CONFIG_DIR` environment variable, then
//! `dirs::config_dir()/loom`.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub const CONFIG_DIR_ENV: &str = "LOOM_CONFIG_DIR";
const APP_DIR_NAME: &str = "loom";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Cannot determine the user configuration directory")]
    ConfigDirNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoomPaths {
    root: PathBuf,
}

impl LoomPaths {
    /// Uses `root` as the storage directory as is.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(override_dir: Option<PathBuf>) -> Result<Self, PathError> {
        Self::resolve_with(
            override_dir,
            std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from),
            dirs::config_dir(),
        )
    }

    fn resolve_with(
        override_dir: Option<PathBuf>,
        env_dir: Option<PathBuf>,
        platform_config_dir: Option<PathBuf>,
    ) -> Result<Self, PathError> {
        if let Some(dir) = override_dir.or(env_dir).filter(|d| !d.as_os_str().is_empty()) {
            return Ok(Self::new(dir));
        }
        platform_config_dir
            .map(|dir| Self::new(dir.join(APP_DIR_NAME)))
            .ok_or(PathError::ConfigDirNotFound)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing a storage key.
    pub fn file_for_key(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let paths = LoomPaths::resolve_with(
            Some(PathBuf::from("/tmp/override")),
            Some(PathBuf::from("/tmp/env")),
            Some(PathBuf::from("/home/u/.config")),
        )
        .unwrap();
        assert_eq!(paths.root(), Path::new("/tmp/override"));
    }

    #[test]
    fn test_env_then_platform_dir() {
        let paths = LoomPaths::resolve_with(
            None,
            Some(PathBuf::from("/tmp/env")),
            Some(PathBuf::from("/home/u/.config")),
        )
        .unwrap();
        assert_eq!(paths.root(), Path::new("/tmp/env"));

        let paths =
            LoomPaths::resolve_with(None, None, Some(PathBuf::from("/home/u/.config"))).unwrap();
        assert_eq!(paths.root(), Path::new("/home/u/.config/loom"));
    }

    #[test]
    fn test_no_directory_available() {
        let err = LoomPaths::resolve_with(None, Some(PathBuf::new()), None).unwrap_err();
        assert!(matches!(err, PathError::ConfigDirNotFound));
    }

    #[test]
    fn test_file_for_key() {
        let paths = LoomPaths::new("/data");
        assert_eq!(
            paths.file_for_key("data-loom-settings"),
            PathBuf::from("/data/data-loom-settings.toml")
        );
    }
}
