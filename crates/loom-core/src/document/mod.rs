//! Document domain module.
//!
//! # Module Structure
//!
//! - `model`: the `Document` entity and file-name helpers
//! - `store`: `DocumentStore`, which owns the documents together with the
//!   active-document pointer and the context selection

mod model;
mod store;

// Re-export public API
pub use model::{Document, duplicate_name, file_extension, initial_content, new_document_id};
pub use store::{DocumentStore, SharedDocumentStore};
