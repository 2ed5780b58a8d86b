use serde::{Deserialize, Serialize};

use crate::document::{Document, DocumentStore};
use crate::locale::Locale;
use crate::task::{GenerationTask, OutputFormat};

/// Everything needed to restore a workspace between runs: the task form and
/// the document store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSnapshot {
    pub task_description: String,
    pub requirements: String,
    pub output_format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_document_id: Option<String>,
    pub context_ids: Vec<String>,
    pub locale: Locale,
    // Array of tables; kept last for TOML output.
    pub documents: Vec<Document>,
}

impl WorkspaceSnapshot {
    pub fn capture(task: &GenerationTask, store: &DocumentStore) -> Self {
        Self {
            task_description: task.task_description.clone(),
            requirements: task.requirements.clone(),
            output_format: task.output_format,
            active_document_id: store.active_document_id().map(str::to_string),
            context_ids: store.context_ids().to_vec(),
            locale: store.locale(),
            documents: store.documents().to_vec(),
        }
    }

    pub fn task(&self) -> GenerationTask {
        GenerationTask::new(
            self.task_description.clone(),
            self.requirements.clone(),
            self.output_format,
        )
    }

    /// Rebuilds the store. Dangling ids in stored data are dropped.
    pub fn to_store(&self) -> DocumentStore {
        DocumentStore::restore(
            self.documents.clone(),
            self.active_document_id.clone(),
            self.context_ids.clone(),
            self.locale,
        )
    }

    pub fn into_parts(self) -> (GenerationTask, DocumentStore) {
        let task = self.task();
        let store = DocumentStore::restore(
            self.documents,
            self.active_document_id,
            self.context_ids,
            self.locale,
        );
        (task, store)
    }
}
