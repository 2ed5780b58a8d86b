//! Streaming client for OpenAI-compatible Chat Completions APIs.
//!
//! Configuration priority for the API key: stored settings, then the
//! `OPENAI_API_KEY` environment variable.

use std::collections::VecDeque;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use loom_core::completion::{
    ChatMessage, CompletionClient, CompletionConnector, CompletionError, CompletionRequest,
    IncrementStream, MessageRole, cancellable,
};
use loom_core::settings::{DEFAULT_MODEL, Settings, SharedSettings};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::sse::{SseDecoder, SseEvent};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Completion client for the OpenAI HTTP API and compatible servers.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_http(build_http_client(), api_key, model)
    }

    fn with_http(http: Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: model.into(),
        }
    }

    /// Points the client at another OpenAI-compatible server. An empty
    /// value keeps the public endpoint.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        let base_url = base_url.as_ref().trim().trim_end_matches('/');
        if !base_url.is_empty() {
            self.base_url = base_url.to_string();
        }
        self
    }

    /// Builds a client from settings, falling back to the environment for
    /// the API key. Fails with `NotConfigured` before any network activity.
    pub fn from_settings(settings: &Settings) -> Result<Self, CompletionError> {
        Self::from_settings_with(build_http_client(), settings)
    }

    fn from_settings_with(http: Client, settings: &Settings) -> Result<Self, CompletionError> {
        let api_key = resolve_api_key(settings, env::var(API_KEY_ENV).ok()).ok_or_else(|| {
            CompletionError::not_configured(format!(
                "API key is not set (configure it in settings or {API_KEY_ENV})"
            ))
        })?;
        let model = if settings.model.trim().is_empty() {
            DEFAULT_MODEL
        } else {
            settings.model.trim()
        };

        Ok(Self::with_http(http, api_key, model).with_base_url(&settings.api_endpoint))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<IncrementStream, CompletionError> {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model
        };
        let body = ChatCompletionRequest {
            model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            stream: true,
        };

        tracing::debug!(
            endpoint = %self.endpoint(),
            model = %body.model,
            messages = body.messages.len(),
            "Sending streaming completion request"
        );

        let send = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
            response = send => response.map_err(map_transport_error)?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(cancellable(decode_increments(bytes), cancel))
    }
}

/// Creates clients from the shared settings, re-reading them on every
/// connect so edits apply to the next generation.
pub struct OpenAiConnector {
    settings: SharedSettings,
    http: Client,
}

impl OpenAiConnector {
    pub fn new(settings: SharedSettings) -> Self {
        Self {
            settings,
            http: build_http_client(),
        }
    }
}

#[async_trait]
impl CompletionConnector for OpenAiConnector {
    async fn connect(&self) -> Result<Arc<dyn CompletionClient>, CompletionError> {
        let settings = self.settings.read().await.clone();
        let client = OpenAiClient::from_settings_with(self.http.clone(), &settings)?;
        tracing::debug!(
            base_url = %client.base_url(),
            model = %client.default_model(),
            "Completion client ready"
        );
        Ok(Arc::new(client))
    }
}

/// Whether a request can be issued with these settings.
pub fn can_create_client(settings: &Settings) -> bool {
    resolve_api_key(settings, env::var(API_KEY_ENV).ok()).is_some()
}

/// Stored key first, then `env_key`. Blank values count as missing.
pub fn resolve_api_key(settings: &Settings, env_key: Option<String>) -> Option<String> {
    let stored = settings.api_key.trim();
    if !stored.is_empty() {
        return Some(stored.to_string());
    }
    env_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

fn build_http_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!("Falling back to default HTTP client: {}", err);
            Client::new()
        })
}

struct DecodeState {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, CompletionError>>,
    finished: bool,
}

/// Turns the response body into text increments.
fn decode_increments(
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
) -> IncrementStream {
    let state = DecodeState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.enqueue(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    state.pending.push_back(Err(CompletionError::interrupted(format!(
                        "Failed to read stream: {err}"
                    ))));
                }
                None => {
                    let tail = state.decoder.finish();
                    state.enqueue(tail);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

impl DecodeState {
    fn enqueue(&mut self, events: impl IntoIterator<Item = SseEvent>) {
        for event in events {
            if self.finished {
                return;
            }
            match event {
                SseEvent::Delta(text) => self.pending.push_back(Ok(text)),
                SseEvent::Error(message) => {
                    self.pending
                        .push_back(Err(CompletionError::interrupted(message)));
                    self.finished = true;
                }
                SseEvent::Done => self.finished = true,
            }
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
        };
        Self {
            role,
            content: message.content.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn map_transport_error(err: reqwest::Error) -> CompletionError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "could not connect"
    } else {
        "failed"
    };
    CompletionError::interrupted(format!("Completion request {kind}: {err}"))
}

fn map_http_error(status: StatusCode, body: String) -> CompletionError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CompletionError::not_configured(format!("{status}: {message}"))
        }
        _ => CompletionError::http_status(status.as_u16(), format!("{status}: {message}")),
    }
}
