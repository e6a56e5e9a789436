use crate::command::{CommandKind, ExecutionResult};
use crate::config::AppConfig;
use crate::executor::{InMemoryTaskStore, StoreScopeFactory};
use crate::notify::{spawn_logging_subscriber, spawn_notification_subscriber, LoggingNotifier};
use crate::queue::{create_shared_queue, ResultSubscription};
use crate::task::Task;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;

/// What happened to a configured command batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub enqueued: usize,
    pub succeeded: usize,
    pub rejected: usize,
    /// Enqueued commands that produced no result (retries exhausted or shut down first)
    pub unfinished: usize,
    pub results: Vec<ExecutionResult>,
    pub tasks: Vec<Task>,
}

/// Run the configured commands through a fresh queue over an in-memory store
///
/// Pipelines give no ordering across kinds, so the runner waits for the queue
/// to drain whenever the batch switches kind. Within a run of one kind the
/// commands are enqueued back to back.
pub async fn run_batch(config: &AppConfig) -> Result<BatchSummary> {
    let store = InMemoryTaskStore::new();
    let scopes = Arc::new(StoreScopeFactory::new(store.clone()));
    let queue = create_shared_queue(scopes, config.queue.clone());

    let logger = spawn_logging_subscriber(&queue);
    let notifier = spawn_notification_subscriber(&queue, Arc::new(LoggingNotifier));
    let subscriptions: Vec<ResultSubscription> =
        CommandKind::ALL.iter().map(|kind| queue.results(*kind)).collect();

    let mut summary = BatchSummary::default();
    let drive = async {
        let mut previous: Option<CommandKind> = None;
        for command in config.commands() {
            let kind = command.kind();
            if previous.is_some_and(|p| p != kind) {
                queue.wait_until_drained().await;
            }
            previous = Some(kind);

            let description = command.describe();
            match queue.enqueue(command) {
                Ok(()) => summary.enqueued += 1,
                Err(e) => warn!("Could not enqueue {}: {}", description, e),
            }
        }
        queue.wait_until_drained().await;
    };

    tokio::select! {
        _ = drive => {}
        _ = tokio::signal::ctrl_c() => {
            println!("🛑 Interrupted, shutting down queue");
        }
    }
    queue.shutdown().await;

    for subscription in subscriptions {
        summary.results.extend(subscription.collect().await);
    }
    logger.await.context("Logging subscriber failed")?;
    notifier.await.context("Notification subscriber failed")?;

    summary.succeeded = summary.results.iter().filter(|r| r.success).count();
    summary.rejected = summary.results.len() - summary.succeeded;
    summary.unfinished = summary.enqueued.saturating_sub(summary.results.len());
    summary.tasks = store.get_all().await;

    Ok(summary)
}
