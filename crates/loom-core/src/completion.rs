//! Streaming completion contract.
//!
//! The generation manager talks to a provider only through these traits.
//! `loom-interaction` ships the OpenAI-compatible implementation; tests use
//! scripted clients.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Lazy sequence of text increments. Ends on end-of-stream or after yielding
/// an error.
pub type IncrementStream = BoxStream<'static, Result<String, CompletionError>>;

/// Errors produced by a completion client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// Credentials are missing or were rejected. Never retried.
    #[error("client not configured: {0}")]
    NotConfigured(String),

    /// Transport failure before or during the stream.
    #[error("stream interrupted: {message}")]
    Interrupted {
        message: String,
        status: Option<u16>,
    },

    /// The cancellation token fired.
    #[error("cancelled")]
    Cancelled,
}

impl CompletionError {
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured(message.into())
    }

    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::Interrupted {
            message: message.into(),
            status: None,
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Interrupted {
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

/// One entry of the ordered message list sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
}

/// A configured client able to stream completions.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model id used when the caller does not pick one.
    fn default_model(&self) -> &str;

    /// Issues the request and returns the increment stream.
    ///
    /// Implementations must stop yielding increments promptly once `cancel`
    /// fires and must end the stream with [`CompletionError::Cancelled`]
    /// instead of ending silently.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<IncrementStream, CompletionError>;
}

/// Turns the current credentials into a client.
///
/// Called once per generation so that settings edits apply to the next
/// request. Reports [`CompletionError::NotConfigured`] without touching the
/// network when credentials are absent.
#[async_trait]
pub trait CompletionConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn CompletionClient>, CompletionError>;
}

/// Wraps `inner` so that it ends with [`CompletionError::Cancelled`] as soon
/// as `cancel` fires.
///
/// The stream also ends right after the first error it forwards.
pub fn cancellable(inner: IncrementStream, cancel: CancellationToken) -> IncrementStream {
    stream::unfold(Some((inner, cancel)), |state| async move {
        let (mut inner, cancel) = state?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Some((Err(CompletionError::Cancelled), None)),
            item = inner.next() => match item {
                Some(Ok(text)) => Some((Ok(text), Some((inner, cancel)))),
                Some(Err(err)) => Some((Err(err), None)),
                None => None,
            },
        }
    })
    .boxed()
}
