use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use loom_application::GenerationController;
use loom_core::generation::{GenerationManager, SessionOutcome};
use loom_core::notification::{ChannelNotificationSink, Notification, NotificationLevel};
use loom_core::settings::SettingsRepository;
use loom_core::task::{GenerationTask, OutputFormat};
use loom_interaction::OpenAiConnector;
use tokio::sync::RwLock;

use super::context::{AppContext, resolve_document};

/// Per-run changes to the stored task. Supplied fields are saved.
pub struct TaskOverrides {
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub format: Option<OutputFormat>,
}

pub async fn run(
    ctx: &AppContext,
    document: Option<String>,
    overrides: TaskOverrides,
) -> Result<()> {
    if let Some(reference) = document {
        let mut store = ctx.workspace.store().write().await;
        let id = resolve_document(&store, &reference)?;
        store.set_active_document(Some(&id))?;
    }

    let task = build_task(ctx, overrides).await;

    let settings = ctx.settings.load().await?;
    let connector = OpenAiConnector::new(Arc::new(RwLock::new(settings)));
    let (sink, mut notifications) = ChannelNotificationSink::channel();
    let manager = GenerationManager::new(
        ctx.workspace.store().clone(),
        Arc::new(connector),
        Arc::new(sink),
    );
    let controller = GenerationController::new(Arc::new(manager));

    let session = controller.send_message(&task).await?;
    let mut text = controller.streamed_text();
    let mut printer = IncrementPrinter::default();

    loop {
        tokio::select! {
            changed = text.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = text.borrow_and_update().clone();
                printer.show(&current)?;
            }
            _ = session.wait() => break,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                if controller.abort() {
                    eprintln!("\n⏹ Cancelling...");
                }
            }
        }
    }
    printer.show(&session.committed_text())?;
    println!();

    while let Ok(notification) = notifications.try_recv() {
        report(&notification);
    }

    // Partial output is kept in the document whatever the outcome.
    ctx.workspace.save().await?;

    match session.wait().await {
        SessionOutcome::Completed(response) => {
            eprintln!(
                "✅ Generated {} characters in {} attempt(s)",
                response.text.chars().count(),
                session.attempt_count()
            );
            Ok(())
        }
        SessionOutcome::Cancelled { partial_text } => {
            eprintln!(
                "⏹ Cancelled; kept {} characters",
                partial_text.chars().count()
            );
            Ok(())
        }
        SessionOutcome::Failed { error, .. } => Err(anyhow!(error).context("Generation failed")),
    }
}

async fn build_task(ctx: &AppContext, overrides: TaskOverrides) -> GenerationTask {
    let TaskOverrides {
        description,
        requirements,
        format,
    } = overrides;

    ctx.workspace
        .update_task(|task| {
            if let Some(description) = description {
                task.task_description = description;
            }
            if let Some(requirements) = requirements {
                task.requirements = requirements;
            }
        })
        .await;

    let mut task = ctx.workspace.task().await;
    task.output_format = match format {
        Some(format) => format,
        None => ctx.workspace.store().read().await.current_output_format(),
    };
    task
}

/// Writes only the part of the cumulative text not yet on stdout.
#[derive(Default)]
struct IncrementPrinter {
    printed: String,
}

impl IncrementPrinter {
    fn show(&mut self, current: &str) -> Result<()> {
        if current.is_empty() {
            return Ok(());
        }
        let mut stdout = std::io::stdout().lock();
        match current.strip_prefix(self.printed.as_str()) {
            Some(rest) if !rest.is_empty() => write!(stdout, "{rest}")?,
            Some(_) => return Ok(()),
            // A retry restarted the text.
            None => write!(stdout, "\n{current}")?,
        }
        stdout.flush()?;
        self.printed = current.to_string();
        Ok(())
    }
}

fn report(notification: &Notification) {
    let marker = match notification.level {
        NotificationLevel::Error => "❌",
        NotificationLevel::Warning => "⚠️",
        NotificationLevel::Success => "✅",
        NotificationLevel::Info => "ℹ️",
    };
    eprintln!("{marker} {}", notification.message);
}
