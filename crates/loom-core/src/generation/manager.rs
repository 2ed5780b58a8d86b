//! Streaming generation manager.
//!
//! Owns at most one live [`GenerationSession`] and drives it on a spawned
//! tokio task: connect, stream, write each increment into the target
//! document, then retry or settle according to the [`RetryCoordinator`].

use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tracing::Instrument;

use super::retry::{RetryCoordinator, RetryDecision, RetryPolicy};
use super::session::{GenerationSession, SessionOutcome};
use crate::completion::{CompletionClient, CompletionConnector, CompletionRequest};
use crate::document::SharedDocumentStore;
use crate::error::{LoomError, Result};
use crate::notification::NotificationSink;
use crate::prompt::{AssembledPrompt, PromptAssembler};
use crate::task::GenerationTask;

/// Receives the cumulative text after every applied increment.
///
/// Runs on the driver task with no lock held.
pub type UpdateCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub struct GenerationManager {
    store: SharedDocumentStore,
    connector: Arc<dyn CompletionConnector>,
    coordinator: Arc<RetryCoordinator>,
    current: Mutex<Option<Arc<GenerationSession>>>,
}

impl GenerationManager {
    pub fn new(
        store: SharedDocumentStore,
        connector: Arc<dyn CompletionConnector>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::with_retry_policy(store, connector, notifier, RetryPolicy::default())
    }

    pub fn with_retry_policy(
        store: SharedDocumentStore,
        connector: Arc<dyn CompletionConnector>,
        notifier: Arc<dyn NotificationSink>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            connector,
            coordinator: Arc::new(RetryCoordinator::new(policy, notifier)),
            current: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &SharedDocumentStore {
        &self.store
    }

    /// The live session, or the most recent one once it has ended.
    pub fn current(&self) -> Option<Arc<GenerationSession>> {
        self.lock_current().clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.lock_current()
            .as_ref()
            .is_some_and(|session| session.is_streaming())
    }

    /// Starts generating into the active document.
    ///
    /// Fails with [`LoomError::NoActiveDocument`] without creating a
    /// session. A session that is still streaming is cancelled first. The
    /// returned session is already `Streaming`; the request itself runs on
    /// a spawned task.
    pub async fn start(
        &self,
        task: &GenerationTask,
        on_update: Option<UpdateCallback>,
    ) -> Result<Arc<GenerationSession>> {
        let (target, prompt) = {
            let store = self.store.read().await;
            let target = store
                .active_document_id()
                .ok_or(LoomError::NoActiveDocument)?
                .to_string();
            (target, PromptAssembler::assemble(task, &store))
        };

        let session = Arc::new(GenerationSession::new(target));
        {
            let mut current = self.lock_current();
            if let Some(previous) = current.take() {
                if previous.cancel() {
                    tracing::info!(
                        session_id = %previous.id(),
                        "Cancelled previous generation before starting a new one"
                    );
                }
            }
            session.begin_streaming();
            *current = Some(session.clone());
        }

        tracing::info!(
            session_id = %session.id(),
            document_id = %session.target_document_id(),
            output_format = %task.output_format,
            "Generation started"
        );

        let driver = SessionDriver {
            session: session.clone(),
            store: self.store.clone(),
            connector: self.connector.clone(),
            coordinator: self.coordinator.clone(),
            prompt,
            on_update,
        };
        let span = tracing::info_span!("generation", session_id = %session.id());
        tokio::spawn(driver.run().instrument(span));

        Ok(session)
    }

    /// Starts a generation and waits for its outcome.
    pub async fn generate(
        &self,
        task: &GenerationTask,
        on_update: Option<UpdateCallback>,
    ) -> Result<SessionOutcome> {
        let session = self.start(task, on_update).await?;
        Ok(session.wait().await)
    }

    /// Cancels the live session. Returns `false` when nothing was streaming.
    pub fn cancel(&self) -> bool {
        self.lock_current()
            .as_ref()
            .is_some_and(|session| session.cancel())
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Arc<GenerationSession>>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Everything the spawned task needs to run one session to its end.
struct SessionDriver {
    session: Arc<GenerationSession>,
    store: SharedDocumentStore,
    connector: Arc<dyn CompletionConnector>,
    coordinator: Arc<RetryCoordinator>,
    prompt: AssembledPrompt,
    on_update: Option<UpdateCallback>,
}

impl SessionDriver {
    async fn run(self) {
        let client = match self.connector.connect().await {
            Ok(client) => client,
            Err(err) => {
                // Connecting is not an attempt; nothing here is retried.
                let err = LoomError::from(err);
                if err.is_cancelled() {
                    self.session.cancel();
                } else {
                    self.coordinator.surface(&self.session, err);
                }
                return;
            }
        };

        let request = CompletionRequest {
            messages: self.prompt.to_messages(),
            model: client.default_model().to_string(),
        };

        loop {
            if !self.session.begin_attempt() {
                return;
            }

            let err = match self.stream_attempt(client.as_ref(), request.clone()).await {
                Ok(()) => {
                    if self.session.complete() {
                        let elapsed = chrono::Utc::now() - self.session.created_at();
                        tracing::info!(
                            attempts = self.session.attempt_count(),
                            chars = self.session.accumulated_text().chars().count(),
                            elapsed_ms = elapsed.num_milliseconds(),
                            "Generation completed"
                        );
                    }
                    return;
                }
                Err(err) => err,
            };

            match self.coordinator.decide(&self.session, err) {
                RetryDecision::Suppress => {
                    // A client that reports cancellation on its own still
                    // ends the session.
                    self.session.cancel();
                    tracing::debug!("Generation stopped after cancellation");
                    return;
                }
                RetryDecision::Retry { delay } => {
                    tracing::warn!(
                        attempt = self.session.attempt_count(),
                        delay_ms = delay.as_millis() as u64,
                        "Stream interrupted, retrying"
                    );
                    let token = self.session.cancellation_token();
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::Surface(err) => {
                    self.coordinator.surface(&self.session, err);
                    return;
                }
            }
        }
    }

    async fn stream_attempt(
        &self,
        client: &dyn CompletionClient,
        request: CompletionRequest,
    ) -> Result<()> {
        let mut stream = client
            .stream_completion(request, self.session.cancellation_token())
            .await?;

        let mut increments = 0usize;
        while let Some(item) = stream.next().await {
            let increment = item?;
            if increment.is_empty() {
                continue;
            }

            let applied = {
                let mut store = self.store.write().await;
                self.session.apply_increment(&mut store, &increment)?
            };

            match applied {
                Some(text) => {
                    increments += 1;
                    // A cancel between the write and here means a newer
                    // generation may already own the observers.
                    let on_update = self
                        .on_update
                        .as_ref()
                        .filter(|_| self.session.is_streaming());
                    if let Some(on_update) = on_update {
                        on_update(&text);
                    }
                }
                // The session left Streaming; drop the rest of the stream.
                None => return Err(LoomError::Cancelled),
            }
        }

        tracing::debug!(increments, "Stream ended");
        Ok(())
    }
}
