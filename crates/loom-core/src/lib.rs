//! Core domain of the Loom workspace: documents, prompt assembly and the
//! streaming generation manager.

pub mod completion;
pub mod document;
pub mod error;
pub mod generation;
pub mod locale;
pub mod notification;
pub mod prompt;
pub mod settings;
pub mod task;
pub mod workspace;

// Re-export common types
pub use document::{Document, DocumentStore, SharedDocumentStore};
pub use error::{LoomError, Result};
pub use generation::{GenerationManager, GenerationSession, SessionOutcome, SessionPhase};
pub use locale::Locale;
pub use task::{GenerationTask, OutputFormat};
