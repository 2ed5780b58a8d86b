//! In-memory document store.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::model::{Document, duplicate_name};
use crate::error::{LoomError, Result};
use crate::locale::Locale;
use crate::task::OutputFormat;

/// Document store shared between the UI layer and the generation manager.
pub type SharedDocumentStore = Arc<RwLock<DocumentStore>>;

/// Owns the workspace documents, the active-document pointer and the set of
/// documents injected as prompt context.
///
/// Every mutating method leaves the store consistent before it returns:
/// - the active id, if any, refers to an existing document
/// - every context id refers to an existing document
///
/// Context ids are kept in the order they were selected; prompt assembly
/// always walks the documents in workspace order.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    active_document_id: Option<String>,
    context_ids: Vec<String>,
    locale: Locale,
}

impl DocumentStore {
    /// Creates an empty store using the default locale.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale(locale: Locale) -> Self {
        Self {
            locale,
            ..Self::default()
        }
    }

    /// Rebuilds a store from persisted parts.
    ///
    /// Duplicate document ids keep their first occurrence; dangling active
    /// and context ids are dropped.
    pub fn restore(
        documents: Vec<Document>,
        active_document_id: Option<String>,
        context_ids: Vec<String>,
        locale: Locale,
    ) -> Self {
        let mut seen = HashSet::new();
        let documents: Vec<Document> = documents
            .into_iter()
            .filter(|doc| seen.insert(doc.id.clone()))
            .collect();

        let mut store = Self {
            documents,
            active_document_id: None,
            context_ids: Vec::new(),
            locale,
        };

        let active_document_id = active_document_id.filter(|id| store.contains(id));
        store.active_document_id = active_document_id;
        for id in context_ids {
            if store.contains(&id) && !store.context_ids.contains(&id) {
                store.context_ids.push(id);
            }
        }

        store
    }

    /// Wraps the store for sharing across tasks.
    pub fn into_shared(self) -> SharedDocumentStore {
        Arc::new(RwLock::new(self))
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.document(id).is_some()
    }

    pub fn active_document_id(&self) -> Option<&str> {
        self.active_document_id.as_deref()
    }

    pub fn active_document(&self) -> Option<&Document> {
        self.active_document_id
            .as_deref()
            .and_then(|id| self.document(id))
    }

    /// Selected context ids, in selection order.
    pub fn context_ids(&self) -> &[String] {
        &self.context_ids
    }

    pub fn is_in_context(&self, id: &str) -> bool {
        self.context_ids.iter().any(|ctx| ctx == id)
    }

    /// Context documents in workspace order.
    pub fn context_documents(&self) -> Vec<&Document> {
        self.documents
            .iter()
            .filter(|doc| self.is_in_context(&doc.id))
            .collect()
    }

    /// Output format implied by the active document's extension.
    pub fn current_output_format(&self) -> OutputFormat {
        self.active_document()
            .map(|doc| OutputFormat::from_file_name(&doc.name))
            .unwrap_or_default()
    }

    // ============================================================================
    // Mutations
    // ============================================================================

    /// Appends a new document and returns its id.
    ///
    /// `.json` documents start as `{}`; everything else starts empty.
    pub fn create_document(&mut self, name: impl Into<String>) -> String {
        let document = Document::new(name);
        let id = document.id.clone();
        tracing::debug!(document_id = %id, name = %document.name, "Created document");
        self.documents.push(document);
        id
    }

    /// Removes a document together with its active and context references.
    ///
    /// Deleting an unknown id is a no-op.
    pub fn delete_document(&mut self, id: &str) {
        if self.active_document_id.as_deref() == Some(id) {
            self.active_document_id = None;
        }
        self.context_ids.retain(|ctx| ctx != id);
        self.documents.retain(|doc| doc.id != id);
    }

    pub fn rename_document(&mut self, id: &str, new_name: impl Into<String>) -> Result<()> {
        let document = self.document_mut(id)?;
        document.name = new_name.into();
        Ok(())
    }

    /// Copies a document's content into a new document named with the
    /// locale's copy marker. Returns the new id.
    pub fn duplicate_document(&mut self, id: &str) -> Result<String> {
        let source = self
            .document(id)
            .ok_or_else(|| LoomError::document_not_found(id))?;

        let mut copy = Document::new(duplicate_name(&source.name, self.locale));
        copy.content = source.content.clone();

        let new_id = copy.id.clone();
        self.documents.push(copy);
        Ok(new_id)
    }

    /// Sets or clears the active document.
    pub fn set_active_document(&mut self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) if !self.contains(id) => Err(LoomError::document_not_found(id)),
            Some(id) => {
                self.active_document_id = Some(id.to_string());
                Ok(())
            }
            None => {
                self.active_document_id = None;
                Ok(())
            }
        }
    }

    pub fn set_document_content(&mut self, id: &str, content: impl Into<String>) -> Result<()> {
        let document = self.document_mut(id)?;
        document.content = content.into();
        Ok(())
    }

    /// Adds or removes a document from the prompt context.
    ///
    /// Removing an id that is not selected is a no-op; adding requires the
    /// document to exist.
    pub fn toggle_context(&mut self, id: &str, included: bool) -> Result<()> {
        if included {
            if !self.contains(id) {
                return Err(LoomError::document_not_found(id));
            }
            if !self.is_in_context(id) {
                self.context_ids.push(id.to_string());
            }
        } else {
            self.context_ids.retain(|ctx| ctx != id);
        }
        Ok(())
    }

    /// Drops every document and selection, keeping the locale.
    pub fn reset(&mut self) {
        self.documents.clear();
        self.active_document_id = None;
        self.context_ids.clear();
    }

    fn document_mut(&mut self, id: &str) -> Result<&mut Document> {
        self.documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| LoomError::document_not_found(id))
    }
}
