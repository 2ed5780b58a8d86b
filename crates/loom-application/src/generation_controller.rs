//! Observable front for the generation manager.
//!
//! UI layers subscribe to three watch channels instead of polling the
//! session: whether a generation is running, the last user-visible error,
//! and the text streamed so far.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use loom_core::error::Result;
use loom_core::generation::{
    GenerationManager, GenerationSession, SessionOutcome, UpdateCallback,
};
use loom_core::task::GenerationTask;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct GenerationController {
    manager: Arc<GenerationManager>,
    streaming_tx: Arc<watch::Sender<bool>>,
    error_tx: Arc<watch::Sender<Option<String>>>,
    text_tx: Arc<watch::Sender<String>>,
    /// Bumped for every generation; updates from older ones are dropped.
    text_epoch: Arc<AtomicU64>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl GenerationController {
    pub fn new(manager: Arc<GenerationManager>) -> Self {
        let (streaming_tx, _) = watch::channel(false);
        let (error_tx, _) = watch::channel(None);
        let (text_tx, _) = watch::channel(String::new());
        Self {
            manager,
            streaming_tx: Arc::new(streaming_tx),
            error_tx: Arc::new(error_tx),
            text_tx: Arc::new(text_tx),
            text_epoch: Arc::new(AtomicU64::new(0)),
            watcher: Mutex::new(None),
        }
    }

    pub fn manager(&self) -> &Arc<GenerationManager> {
        &self.manager
    }

    pub fn is_streaming(&self) -> watch::Receiver<bool> {
        self.streaming_tx.subscribe()
    }

    /// Last failure message; cleared when a new generation starts.
    pub fn error(&self) -> watch::Receiver<Option<String>> {
        self.error_tx.subscribe()
    }

    /// Cumulative text of the running (or last) generation.
    pub fn streamed_text(&self) -> watch::Receiver<String> {
        self.text_tx.subscribe()
    }

    /// Starts a generation into the active document.
    ///
    /// Errors raised before a session exists (no active document) are
    /// published on the error channel and returned.
    pub async fn send_message(&self, task: &GenerationTask) -> Result<Arc<GenerationSession>> {
        self.error_tx.send_replace(None);
        let on_update = self.text_publisher();

        let session = match self.manager.start(task, Some(on_update)).await {
            Ok(session) => session,
            Err(err) => {
                self.error_tx.send_replace(Some(err.to_string()));
                return Err(err);
            }
        };
        self.streaming_tx.send_replace(true);

        let watcher = tokio::spawn(watch_session(
            session.clone(),
            self.manager.clone(),
            self.streaming_tx.clone(),
            self.error_tx.clone(),
        ));
        if let Some(previous) = self.lock_watcher().replace(watcher) {
            previous.abort();
        }

        Ok(session)
    }

    /// Clears the streamed text and returns the callback that owns it from
    /// now on. Callbacks handed out earlier stop publishing.
    fn text_publisher(&self) -> UpdateCallback {
        let epoch = self.text_epoch.clone();
        let mut mine = 0;
        // The epoch moves under the channel lock so a late update from a
        // superseded generation cannot land after the reset.
        self.text_tx.send_modify(|text| {
            mine = epoch.fetch_add(1, Ordering::SeqCst) + 1;
            text.clear();
        });

        let text_tx = self.text_tx.clone();
        Arc::new(move |text: &str| {
            text_tx.send_if_modified(|current| {
                if epoch.load(Ordering::SeqCst) != mine {
                    return false;
                }
                current.clear();
                current.push_str(text);
                true
            });
        })
    }

    /// Cancels the running generation, keeping its partial output.
    pub fn abort(&self) -> bool {
        let cancelled = self.manager.cancel();
        if cancelled {
            self.streaming_tx.send_replace(false);
        }
        cancelled
    }

    /// Aborts any running generation and clears the observed state.
    pub fn reset(&self) {
        self.abort();
        if let Some(watcher) = self.lock_watcher().take() {
            watcher.abort();
        }
        self.streaming_tx.send_replace(false);
        self.error_tx.send_replace(None);
        self.text_tx.send_modify(|text| {
            self.text_epoch.fetch_add(1, Ordering::SeqCst);
            text.clear();
        });
    }

    fn lock_watcher(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.watcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn watch_session(
    session: Arc<GenerationSession>,
    manager: Arc<GenerationManager>,
    streaming_tx: Arc<watch::Sender<bool>>,
    error_tx: Arc<watch::Sender<Option<String>>>,
) {
    let outcome = session.wait().await;

    // A newer session owns the channels now.
    let is_current = manager
        .current()
        .is_some_and(|current| current.id() == session.id());
    if !is_current {
        return;
    }

    if let SessionOutcome::Failed { error, .. } = outcome {
        error_tx.send_replace(Some(error.to_string()));
    }
    streaming_tx.send_replace(false);
}
