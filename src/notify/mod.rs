//! Result subscribers: logging and success notifications
//!
//! Subscribers observe the queue's result streams and never influence
//! execution. A failing notifier is logged and otherwise ignored.

use crate::command::{CommandKind, ExecutionResult};
use crate::queue::{CommandQueue, ResultSubscription};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Side channel told about every successful command
#[async_trait]
pub trait TaskNotifier: Send + Sync {
    async fn notify(&self, kind: CommandKind, message: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes each notification to the log
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl TaskNotifier for LoggingNotifier {
    async fn notify(&self, kind: CommandKind, message: &str) -> Result<(), NotifyError> {
        info!("Task {} notification: {}", kind, message);
        Ok(())
    }
}

fn subscribe_all(queue: &CommandQueue) -> [ResultSubscription; 3] {
    [
        queue.create_results(),
        queue.update_results(),
        queue.delete_results(),
    ]
}

/// Notify once per successful result until every stream completes
pub fn spawn_notification_subscriber(
    queue: &CommandQueue,
    notifier: Arc<dyn TaskNotifier>,
) -> JoinHandle<()> {
    let [create, update, delete] = subscribe_all(queue);

    tokio::spawn(async move {
        tokio::join!(
            forward_notifications(create, Arc::clone(&notifier)),
            forward_notifications(update, Arc::clone(&notifier)),
            forward_notifications(delete, notifier)
        );
    })
}

async fn forward_notifications(mut results: ResultSubscription, notifier: Arc<dyn TaskNotifier>) {
    while let Some(result) = results.next().await {
        if !result.success {
            continue;
        }
        if let Err(e) = notifier.notify(result.kind, &result.message).await {
            warn!("Failed to deliver {} notification: {}", result.kind, e);
        }
    }
}

/// Log every result until every stream completes
pub fn spawn_logging_subscriber(queue: &CommandQueue) -> JoinHandle<()> {
    let [create, update, delete] = subscribe_all(queue);

    tokio::spawn(async move {
        tokio::join!(log_results(create), log_results(update), log_results(delete));
    })
}

async fn log_results(mut results: ResultSubscription) {
    while let Some(result) = results.next().await {
        log_result(&result);
    }
}

fn log_result(result: &ExecutionResult) {
    if result.success {
        info!(
            "{} succeeded after {} attempt(s): {}",
            result.kind, result.attempts, result.message
        );
    } else {
        warn!("{} rejected: {}", result.kind, result.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::executor::{InMemoryTaskStore, StoreScopeFactory};
    use crate::task::{Task, TaskId};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<(CommandKind, String)>>,
    }

    #[async_trait]
    impl TaskNotifier for RecordingNotifier {
        async fn notify(&self, kind: CommandKind, message: &str) -> Result<(), NotifyError> {
            self.seen.lock().await.push((kind, message.to_string()));
            Ok(())
        }
    }

    struct BrokenNotifier;

    #[async_trait]
    impl TaskNotifier for BrokenNotifier {
        async fn notify(&self, _kind: CommandKind, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError::DeliveryFailed("hub offline".to_string()))
        }
    }

    fn start_queue() -> CommandQueue {
        let scopes = Arc::new(StoreScopeFactory::new(InMemoryTaskStore::new()));
        CommandQueue::start(scopes, QueueConfig::default())
    }

    #[tokio::test]
    async fn test_notifies_only_successes() {
        let queue = start_queue();
        let notifier = Arc::new(RecordingNotifier::default());
        let handle = spawn_notification_subscriber(&queue, notifier.clone());

        queue.enqueue_create(Task::normal("Call the plumber")).unwrap();
        queue.wait_until_drained().await;
        queue.enqueue_delete(TaskId(1)).unwrap();
        queue.enqueue_delete(TaskId(1)).unwrap();
        queue.wait_until_drained().await;
        queue.shutdown().await;
        handle.await.unwrap();

        // Kinds are forwarded independently, so only membership is fixed
        let seen = notifier.seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&(CommandKind::Create, "task #1 saved".to_string())));
        assert!(seen.contains(&(CommandKind::Delete, "task #1 deleted".to_string())));
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_affect_results() {
        let queue = start_queue();
        let handle = spawn_notification_subscriber(&queue, Arc::new(BrokenNotifier));
        let logger = spawn_logging_subscriber(&queue);
        let mut results = queue.create_results();

        queue.enqueue_create(Task::normal("Renew the lease")).unwrap();
        let result = results.next().await.unwrap();
        assert!(result.success);
        assert_eq!(result.attempts, 1);

        queue.shutdown().await;
        handle.await.unwrap();
        logger.await.unwrap();
    }
}
