#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use futures::stream;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::completion::{
        CompletionClient, CompletionConnector, CompletionError, CompletionRequest,
        IncrementStream, MessageRole, cancellable,
    };
    use crate::document::{DocumentStore, SharedDocumentStore};
    use crate::error::LoomError;
    use crate::generation::manager::{GenerationManager, UpdateCallback};
    use crate::generation::retry::RetryPolicy;
    use crate::generation::session::{GenerationResponse, SessionOutcome, SessionPhase};
    use crate::notification::{NotificationLevel, RecordingNotificationSink};
    use crate::task::{GenerationTask, OutputFormat};

    type Item = Result<String, CompletionError>;

    // What one call to `stream_completion` does
    enum Script {
        Items(Vec<Item>),
        // Increments pushed by the test; `honor_cancel` wraps the stream
        Channel {
            rx: mpsc::UnboundedReceiver<Item>,
            honor_cancel: bool,
        },
        Fail(CompletionError),
    }

    struct ScriptedClient {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<CompletionRequest>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        fn default_model(&self) -> &str {
            "test-model"
        }

        async fn stream_completion(
            &self,
            request: CompletionRequest,
            cancel: CancellationToken,
        ) -> Result<IncrementStream, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);

            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(Script::Items(items)) => Ok(cancellable(stream::iter(items).boxed(), cancel)),
                Some(Script::Channel { rx, honor_cancel }) => {
                    let inner = stream::unfold(rx, |mut rx| async move {
                        rx.recv().await.map(|item| (item, rx))
                    })
                    .boxed();
                    if honor_cancel {
                        Ok(cancellable(inner, cancel))
                    } else {
                        Ok(inner)
                    }
                }
                Some(Script::Fail(err)) => Err(err),
                None => Err(CompletionError::interrupted("no script left")),
            }
        }
    }

    struct ScriptedConnector {
        client: Arc<ScriptedClient>,
        connect_error: Option<CompletionError>,
    }

    #[async_trait]
    impl CompletionConnector for ScriptedConnector {
        async fn connect(&self) -> Result<Arc<dyn CompletionClient>, CompletionError> {
            match &self.connect_error {
                Some(err) => Err(err.clone()),
                None => Ok(self.client.clone()),
            }
        }
    }

    struct Harness {
        manager: GenerationManager,
        store: SharedDocumentStore,
        client: Arc<ScriptedClient>,
        notifications: Arc<RecordingNotificationSink>,
        target: String,
    }

    fn harness_with(
        scripts: Vec<Script>,
        connect_error: Option<CompletionError>,
        policy: RetryPolicy,
    ) -> Harness {
        let mut store = DocumentStore::new();
        let target = store.create_document("out.md");
        store.set_document_content(&target, "original").unwrap();
        store.set_active_document(Some(&target)).unwrap();
        let store = store.into_shared();

        let client = ScriptedClient::new(scripts);
        let connector = Arc::new(ScriptedConnector {
            client: client.clone(),
            connect_error,
        });
        let notifications = Arc::new(RecordingNotificationSink::new());
        let manager = GenerationManager::with_retry_policy(
            store.clone(),
            connector,
            notifications.clone(),
            policy,
        );

        Harness {
            manager,
            store,
            client,
            notifications,
            target,
        }
    }

    fn harness(scripts: Vec<Script>) -> Harness {
        harness_with(scripts, None, RetryPolicy::immediate(3))
    }

    fn task() -> GenerationTask {
        GenerationTask::new("Write a report", "Be concise", OutputFormat::Markdown)
    }

    fn ok(text: &str) -> Item {
        Ok(text.to_string())
    }

    fn update_channel() -> (UpdateCallback, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: UpdateCallback = Arc::new(move |text: &str| {
            let _ = tx.send(text.to_string());
        });
        (callback, rx)
    }

    async fn content(h: &Harness) -> Option<String> {
        h.store
            .read()
            .await
            .document(&h.target)
            .map(|doc| doc.content.clone())
    }

    #[tokio::test]
    async fn test_start_without_active_document_fails() {
        let h = harness(vec![Script::Items(vec![ok("never")])]);
        h.store.write().await.set_active_document(None).unwrap();

        let err = h.manager.start(&task(), None).await.unwrap_err();

        assert_eq!(err, LoomError::NoActiveDocument);
        assert!(h.manager.current().is_none());
        assert!(!h.manager.is_streaming());
        assert_eq!(h.client.calls(), 0);
        assert!(h.notifications.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_content_tracks_every_increment() {
        let h = harness(vec![Script::Items(vec![
            ok("Hel"),
            ok(""),
            ok("lo"),
            ok(" world"),
        ])]);

        // Record the document content seen by every callback
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = h.store.clone();
        let target = h.target.clone();
        let seen_in_callback = seen.clone();
        let callback: UpdateCallback = Arc::new(move |text: &str| {
            let content = store
                .try_read()
                .ok()
                .and_then(|s| s.document(&target).map(|d| d.content.clone()));
            seen_in_callback
                .lock()
                .unwrap()
                .push((text.to_string(), content));
        });

        let outcome = h.manager.generate(&task(), Some(callback)).await.unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::Completed(GenerationResponse {
                text: "Hello world".into(),
                is_complete: true,
            })
        );
        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("Hel".to_string(), Some("Hel".to_string())),
                ("Hello".to_string(), Some("Hello".to_string())),
                ("Hello world".to_string(), Some("Hello world".to_string())),
            ]
        );
        assert_eq!(content(&h).await.as_deref(), Some("Hello world"));

        let session = h.manager.current().unwrap();
        assert_eq!(session.phase(), SessionPhase::Completed);
        assert_eq!(session.attempt_count(), 1);
        assert!(h.notifications.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_request_carries_assembled_prompt() {
        let h = harness(vec![Script::Items(vec![ok("x")])]);

        h.manager.generate(&task(), None).await.unwrap();

        let requests = h.client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "test-model");
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].messages[0].role, MessageRole::System);
        assert!(requests[0].messages[0].content.ends_with("Write a report"));
        assert!(requests[0].messages[1].content.starts_with("要求: Be concise"));
    }

    #[tokio::test]
    async fn test_cancel_before_first_increment_keeps_content() {
        let (tx, rx) = mpsc::unbounded_channel();
        let h = harness(vec![Script::Channel {
            rx,
            honor_cancel: true,
        }]);

        let session = h.manager.start(&task(), None).await.unwrap();
        assert!(h.manager.is_streaming());
        assert!(h.manager.cancel());

        assert_eq!(
            session.wait().await,
            SessionOutcome::Cancelled {
                partial_text: String::new()
            }
        );
        assert_eq!(content(&h).await.as_deref(), Some("original"));
        assert_eq!(session.attempt_count(), 0);
        assert!(h.notifications.notifications().is_empty());
        drop(tx);
    }

    #[tokio::test]
    async fn test_cancel_on_terminal_session_is_noop() {
        let h = harness(vec![Script::Items(vec![ok("done")])]);

        let session = h.manager.start(&task(), None).await.unwrap();
        session.wait().await;

        assert!(!h.manager.cancel());
        assert!(!session.cancel());
        assert_eq!(session.phase(), SessionPhase::Completed);
        assert_eq!(content(&h).await.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_increments_after_cancel_are_discarded() {
        let (tx, rx) = mpsc::unbounded_channel();
        // This client keeps yielding after cancellation
        let h = harness(vec![Script::Channel {
            rx,
            honor_cancel: false,
        }]);
        let (callback, mut updates) = update_channel();

        let session = h.manager.start(&task(), Some(callback)).await.unwrap();
        tx.send(ok("kept")).unwrap();
        assert_eq!(updates.recv().await.as_deref(), Some("kept"));

        assert!(session.cancel());
        tx.send(ok(" tail")).unwrap();
        drop(tx);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(content(&h).await.as_deref(), Some("kept"));
        assert_eq!(
            session.wait().await,
            SessionOutcome::Cancelled {
                partial_text: "kept".into()
            }
        );
        assert!(updates.try_recv().is_err());
        assert!(h.notifications.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_new_session_cancels_previous() {
        let (tx, rx) = mpsc::unbounded_channel();
        let h = harness(vec![
            Script::Channel {
                rx,
                honor_cancel: true,
            },
            Script::Items(vec![ok("second")]),
        ]);
        let (callback, mut updates) = update_channel();

        let first = h.manager.start(&task(), Some(callback)).await.unwrap();
        let mut first_phase = first.subscribe();
        // The first driver owns its stream once an increment came through
        tx.send(ok("first")).unwrap();
        assert_eq!(updates.recv().await.as_deref(), Some("first"));
        assert_eq!(h.client.calls(), 1);

        let second = h.manager.start(&task(), None).await.unwrap();

        // The old session is already cancelled when the new one is handed out
        assert_eq!(first.phase(), SessionPhase::Cancelled);
        assert_eq!(*first_phase.borrow_and_update(), SessionPhase::Cancelled);
        assert_ne!(first.id(), second.id());
        assert_eq!(h.manager.current().unwrap().id(), second.id());
        drop(tx);

        assert!(matches!(second.wait().await, SessionOutcome::Completed(_)));
        assert_eq!(
            first.wait().await,
            SessionOutcome::Cancelled {
                partial_text: "first".into()
            }
        );
        assert_eq!(content(&h).await.as_deref(), Some("second"));
        assert_eq!(h.client.calls(), 2);
        assert!(h.notifications.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_failure_after_retries_reports_text_left_in_document() {
        let h = harness(vec![
            Script::Items(vec![ok("abc"), Err(CompletionError::interrupted("r1"))]),
            Script::Fail(CompletionError::interrupted("r2")),
            Script::Fail(CompletionError::interrupted("r3")),
        ]);

        let outcome = h.manager.generate(&task(), None).await.unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::Failed {
                error: LoomError::stream_interrupted("r3"),
                partial_text: "abc".into(),
            }
        );
        assert_eq!(content(&h).await.as_deref(), Some("abc"));
        assert_eq!(h.client.calls(), 3);
        assert_eq!(h.notifications.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_not_configured_on_connect_is_surfaced_once() {
        let h = harness_with(
            vec![Script::Items(vec![ok("never")])],
            Some(CompletionError::not_configured("API key is empty")),
            RetryPolicy::immediate(3),
        );

        let outcome = h.manager.generate(&task(), None).await.unwrap();

        match outcome {
            SessionOutcome::Failed { error, .. } => assert!(error.is_not_configured()),
            other => panic!("Expected failure, got {other:?}"),
        }
        let session = h.manager.current().unwrap();
        assert_eq!(session.attempt_count(), 0);
        assert_eq!(h.client.calls(), 0);

        let notifications = h.notifications.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, NotificationLevel::Error);
        assert_eq!(content(&h).await.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_not_retried() {
        let h = harness(vec![
            Script::Fail(CompletionError::not_configured("401 Unauthorized")),
            Script::Items(vec![ok("never")]),
        ]);

        let outcome = h.manager.generate(&task(), None).await.unwrap();

        assert!(matches!(outcome, SessionOutcome::Failed { .. }));
        assert_eq!(h.client.calls(), 1);
        assert_eq!(h.manager.current().unwrap().attempt_count(), 0);
        assert_eq!(h.notifications.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_interrupted_stream_fails_after_three_attempts() {
        let h = harness(vec![
            Script::Fail(CompletionError::http_status(503, "unavailable")),
            Script::Fail(CompletionError::interrupted("connection reset")),
            Script::Items(vec![ok("partial"), Err(CompletionError::interrupted("eof"))]),
            Script::Items(vec![ok("never")]),
        ]);

        let outcome = h.manager.generate(&task(), None).await.unwrap();

        match outcome {
            SessionOutcome::Failed {
                error,
                partial_text,
            } => {
                assert_eq!(error, LoomError::stream_interrupted("eof"));
                assert_eq!(partial_text, "partial");
            }
            other => panic!("Expected failure, got {other:?}"),
        }
        assert_eq!(h.client.calls(), 3);
        assert_eq!(h.manager.current().unwrap().attempt_count(), 3);
        assert_eq!(h.notifications.notifications().len(), 1);
        // Partial output stays in the document
        assert_eq!(content(&h).await.as_deref(), Some("partial"));
    }

    #[tokio::test]
    async fn test_retry_restarts_buffer() {
        let h = harness(vec![
            Script::Items(vec![ok("stale"), Err(CompletionError::interrupted("reset"))]),
            Script::Items(vec![ok("fresh")]),
        ]);

        let outcome = h.manager.generate(&task(), None).await.unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::Completed(GenerationResponse {
                text: "fresh".into(),
                is_complete: true,
            })
        );
        assert_eq!(content(&h).await.as_deref(), Some("fresh"));
        assert_eq!(h.manager.current().unwrap().attempt_count(), 2);
        assert!(h.notifications.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retrying() {
        let h = harness_with(
            vec![
                Script::Fail(CompletionError::interrupted("reset")),
                Script::Items(vec![ok("never")]),
            ],
            None,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(3600),
                max_delay: Duration::from_secs(3600),
            },
        );

        let session = h.manager.start(&task(), None).await.unwrap();
        for _ in 0..100 {
            if session.attempt_count() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(session.attempt_count(), 1);

        assert!(session.cancel());
        assert!(matches!(
            session.wait().await,
            SessionOutcome::Cancelled { .. }
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.client.calls(), 1);
        assert!(h.notifications.notifications().is_empty());
        assert_eq!(content(&h).await.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_deleting_target_mid_stream_fails_without_retry() {
        let (tx, rx) = mpsc::unbounded_channel();
        let h = harness(vec![
            Script::Channel {
                rx,
                honor_cancel: true,
            },
            Script::Items(vec![ok("never")]),
        ]);
        let (callback, mut updates) = update_channel();

        let session = h.manager.start(&task(), Some(callback)).await.unwrap();
        tx.send(ok("first")).unwrap();
        assert_eq!(updates.recv().await.as_deref(), Some("first"));

        h.store.write().await.delete_document(&h.target);
        tx.send(ok(" second")).unwrap();

        match session.wait().await {
            SessionOutcome::Failed { error, .. } => assert!(error.is_not_found()),
            other => panic!("Expected failure, got {other:?}"),
        }
        assert_eq!(h.client.calls(), 1);
        assert_eq!(h.notifications.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_without_session() {
        let h = harness(vec![]);
        assert!(!h.manager.cancel());
        assert!(h.manager.current().is_none());
    }
}
