//! Workspace snapshot persisted under the `data-loom-workspace` key.

use async_trait::async_trait;
use loom_core::error::{LoomError, Result};
use loom_core::workspace::{WorkspaceRepository, WorkspaceSnapshot};
use tokio::task;

use crate::storage::{KeyedTomlStorage, WORKSPACE_KEY};

pub struct TomlWorkspaceRepository {
    storage: KeyedTomlStorage,
}

impl TomlWorkspaceRepository {
    pub fn new(storage: KeyedTomlStorage) -> Self {
        Self { storage }
    }
}

fn join_error(err: task::JoinError) -> LoomError {
    LoomError::internal(format!("Workspace storage task failed: {err}"))
}

#[async_trait]
impl WorkspaceRepository for TomlWorkspaceRepository {
    async fn load(&self) -> Result<Option<WorkspaceSnapshot>> {
        let file = self.storage.file::<WorkspaceSnapshot>(WORKSPACE_KEY);
        let snapshot = task::spawn_blocking(move || file.load())
            .await
            .map_err(join_error)??;
        if let Some(snapshot) = &snapshot {
            tracing::debug!(documents = snapshot.documents.len(), "Workspace loaded");
        }
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<()> {
        let file = self.storage.file::<WorkspaceSnapshot>(WORKSPACE_KEY);
        let snapshot = snapshot.clone();
        let documents = snapshot.documents.len();
        task::spawn_blocking(move || file.save(&snapshot))
            .await
            .map_err(join_error)??;
        tracing::info!(documents, "Workspace saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let file = self.storage.file::<WorkspaceSnapshot>(WORKSPACE_KEY);
        task::spawn_blocking(move || file.remove())
            .await
            .map_err(join_error)??;
        tracing::info!("Workspace cleared");
        Ok(())
    }
}
