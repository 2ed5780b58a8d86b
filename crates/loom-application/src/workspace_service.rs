//! Loads, holds and saves the workspace between runs.

use std::sync::Arc;

use anyhow::{Context, Result};
use loom_core::document::{DocumentStore, SharedDocumentStore};
use loom_core::locale::Locale;
use loom_core::task::GenerationTask;
use loom_core::workspace::{WorkspaceRepository, WorkspaceSnapshot};
use tokio::sync::RwLock;

/// Owns the shared document store and the task form, backed by a
/// [`WorkspaceRepository`].
pub struct WorkspaceService {
    repository: Arc<dyn WorkspaceRepository>,
    store: SharedDocumentStore,
    task: RwLock<GenerationTask>,
}

impl WorkspaceService {
    /// Restores the saved workspace, or starts empty with `locale`.
    pub async fn load(repository: Arc<dyn WorkspaceRepository>, locale: Locale) -> Result<Self> {
        let snapshot = repository
            .load()
            .await
            .context("Failed to load workspace")?;

        let (task, store) = match snapshot {
            Some(snapshot) => snapshot.into_parts(),
            None => (GenerationTask::default(), DocumentStore::with_locale(locale)),
        };
        tracing::info!(documents = store.documents().len(), "Workspace ready");

        Ok(Self {
            repository,
            store: store.into_shared(),
            task: RwLock::new(task),
        })
    }

    pub fn store(&self) -> &SharedDocumentStore {
        &self.store
    }

    pub async fn task(&self) -> GenerationTask {
        self.task.read().await.clone()
    }

    pub async fn update_task<F>(&self, f: F)
    where
        F: FnOnce(&mut GenerationTask),
    {
        let mut task = self.task.write().await;
        f(&mut task);
    }

    pub async fn save(&self) -> Result<()> {
        let snapshot = {
            let task = self.task.read().await;
            let store = self.store.read().await;
            WorkspaceSnapshot::capture(&task, &store)
        };
        self.repository
            .save(&snapshot)
            .await
            .context("Failed to save workspace")
    }

    /// Clears documents, selections and the task form, in memory and on disk.
    pub async fn reset(&self) -> Result<()> {
        self.store.write().await.reset();
        *self.task.write().await = GenerationTask::default();
        self.repository
            .clear()
            .await
            .context("Failed to clear workspace")
    }
}
