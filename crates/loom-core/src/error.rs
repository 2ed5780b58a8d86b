//! Error types for the Loom workspace.

use thiserror::Error;

use crate::completion::CompletionError;

/// A shared error type for the entire Loom application.
///
/// Generation failures are split into the classes the retry coordinator
/// distinguishes; everything else covers store, storage and configuration
/// problems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoomError {
    /// Generation was requested while no document is active.
    #[error("No active document to generate into")]
    NoActiveDocument,

    /// Credentials are missing or were rejected by the provider.
    #[error("Completion client is not configured: {0}")]
    ClientNotConfigured(String),

    /// The transport failed before or during streaming.
    #[error("Stream interrupted: {message}")]
    StreamInterrupted {
        message: String,
        status: Option<u16>,
    },

    /// The user cancelled the generation. Never shown to the user.
    #[error("Generation cancelled")]
    Cancelled,

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LoomError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a document NotFound error
    pub fn document_not_found(id: impl Into<String>) -> Self {
        Self::not_found("document", id)
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a StreamInterrupted error without an HTTP status
    pub fn stream_interrupted(message: impl Into<String>) -> Self {
        Self::StreamInterrupted {
            message: message.into(),
            status: None,
        }
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error stems from an intentional cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this is a missing or rejected credential
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::ClientNotConfigured(_))
    }

    /// Short, stable code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveDocument => "no_active_document",
            Self::ClientNotConfigured(_) => "client_not_configured",
            Self::StreamInterrupted { .. } => "stream_interrupted",
            Self::Cancelled => "cancelled",
            Self::NotFound { .. } => "not_found",
            Self::Io { .. } => "io_error",
            Self::Serialization { .. } => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<CompletionError> for LoomError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::NotConfigured(message) => Self::ClientNotConfigured(message),
            CompletionError::Interrupted { message, status } => {
                Self::StreamInterrupted { message, status }
            }
            CompletionError::Cancelled => Self::Cancelled,
        }
    }
}

/// A type alias for `Result<T, LoomError>`.
pub type Result<T> = std::result::Result<T, LoomError>;
