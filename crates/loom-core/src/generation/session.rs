//! Generation session state.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::document::DocumentStore;
use crate::error::{LoomError, Result};

/// Lifecycle phase of a generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Completed | SessionPhase::Cancelled | SessionPhase::Failed
        )
    }
}

/// Final text of a completed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    pub is_complete: bool,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed(GenerationResponse),
    /// Stopped by the user. `partial_text` is what the document holds.
    Cancelled { partial_text: String },
    /// Gave up after the retry policy. `partial_text` is what the document
    /// holds, possibly written by an earlier attempt.
    Failed {
        error: LoomError,
        partial_text: String,
    },
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    accumulated_text: String,
    /// Last text written into the target; survives attempt restarts.
    committed_text: String,
    attempt_count: u32,
    error: Option<LoomError>,
}

/// One generation into one target document, retries included.
///
/// The phase is the single source of truth for cancellation: `cancel()`
/// moves the phase to `Cancelled` before signalling the token, so whoever
/// classifies a later transport error already sees the session as cancelled.
/// Increments are only applied while the phase is `Streaming`.
#[derive(Debug)]
pub struct GenerationSession {
    id: String,
    target_document_id: String,
    created_at: DateTime<Utc>,
    token: CancellationToken,
    state: Mutex<SessionState>,
    phase_tx: watch::Sender<SessionPhase>,
}

impl GenerationSession {
    pub(crate) fn new(target_document_id: impl Into<String>) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Self {
            id: Uuid::new_v4().to_string(),
            target_document_id: target_document_id.into(),
            created_at: Utc::now(),
            token: CancellationToken::new(),
            state: Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                accumulated_text: String::new(),
                committed_text: String::new(),
                attempt_count: 0,
                error: None,
            }),
            phase_tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target_document_id(&self) -> &str {
        &self.target_document_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock_state().phase
    }

    pub fn is_streaming(&self) -> bool {
        self.phase() == SessionPhase::Streaming
    }

    /// Text produced by the current attempt so far.
    pub fn accumulated_text(&self) -> String {
        self.lock_state().accumulated_text.clone()
    }

    /// Text this session last wrote into the target document. Unlike
    /// [`accumulated_text`](Self::accumulated_text) it is kept when a retry
    /// restarts the buffer.
    pub fn committed_text(&self) -> String {
        self.lock_state().committed_text.clone()
    }

    /// Attempts charged to the retry budget: successes and interrupted
    /// streams count, cancellations and configuration failures do not.
    pub fn attempt_count(&self) -> u32 {
        self.lock_state().attempt_count
    }

    /// Terminal error, set only when the session failed.
    pub fn error(&self) -> Option<LoomError> {
        self.lock_state().error.clone()
    }

    /// Watches phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Stops a streaming session.
    ///
    /// Returns `true` if this call moved the session to `Cancelled`; calling
    /// it in any other phase changes nothing.
    pub fn cancel(&self) -> bool {
        {
            let mut state = self.lock_state();
            if state.phase != SessionPhase::Streaming {
                return false;
            }
            state.phase = SessionPhase::Cancelled;
        }
        self.token.cancel();
        self.phase_tx.send_replace(SessionPhase::Cancelled);
        tracing::info!(session_id = %self.id, "Generation cancelled");
        true
    }

    /// Waits for a terminal phase and reports the outcome.
    pub async fn wait(&self) -> SessionOutcome {
        let mut rx = self.phase_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|phase| phase.is_terminal()).await;
        self.outcome().unwrap_or_else(|| SessionOutcome::Failed {
            error: LoomError::internal("session ended without a terminal phase"),
            partial_text: self.committed_text(),
        })
    }

    /// Outcome if the session already reached a terminal phase.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        let state = self.lock_state();
        let partial_text = state.committed_text.clone();
        match state.phase {
            SessionPhase::Completed => Some(SessionOutcome::Completed(GenerationResponse {
                text: state.accumulated_text.clone(),
                is_complete: true,
            })),
            SessionPhase::Cancelled => Some(SessionOutcome::Cancelled { partial_text }),
            SessionPhase::Failed => Some(SessionOutcome::Failed {
                error: state
                    .error
                    .clone()
                    .unwrap_or_else(|| LoomError::internal("failed without error")),
                partial_text,
            }),
            SessionPhase::Idle | SessionPhase::Streaming => None,
        }
    }

    // ============================================================================
    // Transitions driven by the manager and the retry coordinator
    // ============================================================================

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn begin_streaming(&self) -> bool {
        self.transition(SessionPhase::Idle, SessionPhase::Streaming, |_| {})
    }

    /// Starts a fresh attempt. The buffer restarts empty; the document keeps
    /// its content until the first increment of this attempt overwrites it.
    pub(crate) fn begin_attempt(&self) -> bool {
        let mut state = self.lock_state();
        if state.phase != SessionPhase::Streaming {
            return false;
        }
        state.accumulated_text.clear();
        true
    }

    /// Appends `increment` and writes the whole buffer into the target
    /// document.
    ///
    /// Returns the cumulative text, or `None` when the session has left
    /// `Streaming` and the increment was discarded. The caller holds the
    /// store's write lock, so the phase check and the write happen together.
    pub(crate) fn apply_increment(
        &self,
        store: &mut DocumentStore,
        increment: &str,
    ) -> Result<Option<String>> {
        let mut state = self.lock_state();
        if state.phase != SessionPhase::Streaming {
            return Ok(None);
        }

        let mut text = String::with_capacity(state.accumulated_text.len() + increment.len());
        text.push_str(&state.accumulated_text);
        text.push_str(increment);

        store.set_document_content(&self.target_document_id, text.clone())?;
        state.accumulated_text.push_str(increment);
        state.committed_text.clone_from(&text);
        Ok(Some(text))
    }

    /// Charges one attempt to the retry budget and returns the new count.
    pub(crate) fn record_attempt(&self) -> u32 {
        let mut state = self.lock_state();
        state.attempt_count += 1;
        state.attempt_count
    }

    pub(crate) fn complete(&self) -> bool {
        self.transition(SessionPhase::Streaming, SessionPhase::Completed, |state| {
            state.attempt_count += 1;
        })
    }

    pub(crate) fn fail(&self, error: LoomError) -> bool {
        self.transition(SessionPhase::Streaming, SessionPhase::Failed, |state| {
            state.error = Some(error);
        })
    }

    fn transition<F>(&self, from: SessionPhase, to: SessionPhase, update: F) -> bool
    where
        F: FnOnce(&mut SessionState),
    {
        {
            let mut state = self.lock_state();
            if state.phase != from {
                return false;
            }
            state.phase = to;
            update(&mut state);
        }
        self.phase_tx.send_replace(to);
        true
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming_session(store: &mut DocumentStore) -> GenerationSession {
        let id = store.create_document("out.md");
        let session = GenerationSession::new(id);
        assert!(session.begin_streaming());
        session
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = GenerationSession::new("file-1");
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.attempt_count(), 0);
        assert!(session.outcome().is_none());
        // Cancelling an idle session does nothing
        assert!(!session.cancel());
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_apply_increment_writes_whole_buffer() {
        let mut store = DocumentStore::new();
        let session = streaming_session(&mut store);
        let target = session.target_document_id().to_string();

        assert_eq!(
            session.apply_increment(&mut store, "Hel").unwrap(),
            Some("Hel".to_string())
        );
        assert_eq!(
            session.apply_increment(&mut store, "lo").unwrap(),
            Some("Hello".to_string())
        );
        assert_eq!(store.document(&target).unwrap().content, "Hello");
        assert_eq!(session.accumulated_text(), "Hello");
    }

    #[test]
    fn test_increments_after_cancel_are_discarded() {
        let mut store = DocumentStore::new();
        let session = streaming_session(&mut store);
        let target = session.target_document_id().to_string();

        session.apply_increment(&mut store, "kept").unwrap();
        assert!(session.cancel());
        assert!(session.cancellation_token().is_cancelled());

        assert_eq!(session.apply_increment(&mut store, " tail").unwrap(), None);
        assert_eq!(store.document(&target).unwrap().content, "kept");
    }

    #[test]
    fn test_cancel_is_idempotent_and_ignored_after_terminal() {
        let mut store = DocumentStore::new();
        let session = streaming_session(&mut store);
        assert!(session.complete());

        assert!(!session.cancel());
        assert!(!session.cancel());
        assert_eq!(session.phase(), SessionPhase::Completed);
        assert_eq!(session.attempt_count(), 1);
    }

    #[test]
    fn test_write_to_deleted_target_fails() {
        let mut store = DocumentStore::new();
        let session = streaming_session(&mut store);
        store.delete_document(session.target_document_id());

        let err = session.apply_increment(&mut store, "x").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(session.accumulated_text(), "");
    }

    #[test]
    fn test_begin_attempt_resets_buffer_only() {
        let mut store = DocumentStore::new();
        let session = streaming_session(&mut store);
        let target = session.target_document_id().to_string();

        session.apply_increment(&mut store, "first try").unwrap();
        assert!(session.begin_attempt());
        assert_eq!(session.accumulated_text(), "");
        assert_eq!(store.document(&target).unwrap().content, "first try");
    }

    #[test]
    fn test_failure_after_restart_reports_document_text() {
        let mut store = DocumentStore::new();
        let session = streaming_session(&mut store);
        let target = session.target_document_id().to_string();

        session.apply_increment(&mut store, "abc").unwrap();
        assert!(session.begin_attempt());
        assert!(session.begin_attempt());
        assert!(session.fail(LoomError::stream_interrupted("r3")));

        assert_eq!(session.accumulated_text(), "");
        assert_eq!(session.committed_text(), "abc");
        assert_eq!(
            session.outcome(),
            Some(SessionOutcome::Failed {
                error: LoomError::stream_interrupted("r3"),
                partial_text: "abc".into(),
            })
        );
        assert_eq!(store.document(&target).unwrap().content, "abc");
    }

    #[test]
    fn test_created_at_is_set_on_creation() {
        let before = Utc::now();
        let session = GenerationSession::new("file-1");
        assert!(session.created_at() >= before);
        assert!(session.created_at() <= Utc::now());
    }

    #[tokio::test]
    async fn test_wait_reports_failure() {
        let mut store = DocumentStore::new();
        let session = streaming_session(&mut store);
        session.apply_increment(&mut store, "partial").unwrap();
        assert!(session.fail(LoomError::stream_interrupted("reset")));

        match session.wait().await {
            SessionOutcome::Failed {
                error,
                partial_text,
            } => {
                assert_eq!(error, LoomError::stream_interrupted("reset"));
                assert_eq!(partial_text, "partial");
            }
            other => panic!("Expected failure, got {other:?}"),
        }
    }
}
