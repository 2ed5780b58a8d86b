//! Settings persisted under the `data-loom-settings` key.

use async_trait::async_trait;
use loom_core::error::{LoomError, Result};
use loom_core::settings::{Settings, SettingsRepository, SettingsUpdate};
use tokio::task;

use crate::storage::{KeyedTomlStorage, SETTINGS_KEY};

pub struct TomlSettingsRepository {
    storage: KeyedTomlStorage,
}

impl TomlSettingsRepository {
    pub fn new(storage: KeyedTomlStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl SettingsRepository for TomlSettingsRepository {
    async fn load(&self) -> Result<Settings> {
        let file = self.storage.file::<Settings>(SETTINGS_KEY);
        let loaded = task::spawn_blocking(move || file.load())
            .await
            .map_err(|e| LoomError::internal(format!("Settings load task failed: {e}")))??;
        Ok(loaded.unwrap_or_default())
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        let file = self.storage.file::<Settings>(SETTINGS_KEY);
        let settings = settings.clone();
        task::spawn_blocking(move || file.save(&settings))
            .await
            .map_err(|e| LoomError::internal(format!("Settings save task failed: {e}")))??;
        tracing::info!("Settings saved");
        Ok(())
    }

    /// Applies the update under the file lock.
    async fn update(&self, update: SettingsUpdate) -> Result<Settings> {
        let file = self.storage.file::<Settings>(SETTINGS_KEY);
        let settings = task::spawn_blocking(move || {
            file.update(Settings::default(), |settings| settings.apply(update))
        })
        .await
        .map_err(|e| LoomError::internal(format!("Settings update task failed: {e}")))??;
        tracing::info!("Settings updated");
        Ok(settings)
    }
}
