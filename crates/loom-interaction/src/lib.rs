//! Completion transport for Loom.
//!
//! Implements the `loom-core` completion contract against OpenAI-compatible
//! Chat Completions endpoints with server-sent-event streaming.

pub mod openai_client;
pub mod sse;

pub use openai_client::{
    API_KEY_ENV, DEFAULT_API_BASE, OpenAiClient, OpenAiConnector, can_create_client,
    resolve_api_key,
};
pub use sse::{SseDecoder, SseEvent};
