use async_trait::async_trait;

use super::model::WorkspaceSnapshot;
use crate::error::Result;

/// Persistence for the workspace snapshot.
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Returns `None` when no workspace has been saved yet.
    async fn load(&self) -> Result<Option<WorkspaceSnapshot>>;

    async fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<()>;

    /// Removes the stored workspace. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<()>;
}
