use async_trait::async_trait;

use super::model::{Settings, SettingsUpdate};
use crate::error::Result;

/// Persistence for [`Settings`].
///
/// Implementations return defaults when nothing has been stored yet.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load(&self) -> Result<Settings>;

    async fn save(&self, settings: &Settings) -> Result<()>;

    /// Loads, applies `update` and stores the result in one step.
    async fn update(&self, update: SettingsUpdate) -> Result<Settings> {
        let mut settings = self.load().await?;
        settings.apply(update);
        self.save(&settings).await?;
        Ok(settings)
    }

    /// Stores and returns the default settings.
    async fn reset(&self) -> Result<Settings> {
        let settings = Settings::default();
        self.save(&settings).await?;
        Ok(settings)
    }
}
