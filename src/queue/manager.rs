//! Command queue owning one retrying pipeline per command kind

use super::pipeline::{PipelineState, RetryingPipeline};
use super::results::{ResultStream, ResultSubscription};
use super::QueueError;
use crate::command::{Command, CommandKind};
use crate::config::QueueConfig;
use crate::executor::ScopeFactory;
use crate::task::{Task, TaskId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Per-kind handles kept by the queue after its pipeline is spawned
struct PipelineHandle {
    input: UnboundedSender<Command>,
    results: Arc<ResultStream>,
    state: watch::Receiver<PipelineState>,
    settled: watch::Receiver<u64>,
    enqueued: AtomicU64,
}

/// Accepts task commands and executes them through three independent pipelines
pub struct CommandQueue {
    pipelines: Vec<PipelineHandle>,
    closed: AtomicBool,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CommandQueue {
    /// Spawn the create, update and delete pipelines on the current runtime
    pub fn start(scopes: Arc<dyn ScopeFactory>, config: QueueConfig) -> Self {
        let cancel = CancellationToken::new();
        let mut pipelines = Vec::with_capacity(CommandKind::ALL.len());
        let mut workers = Vec::with_capacity(CommandKind::ALL.len());

        for kind in CommandKind::ALL {
            let (tx, rx) = mpsc::unbounded_channel();
            let results = Arc::new(ResultStream::new(kind));
            let pipeline = RetryingPipeline::new(
                kind,
                Arc::clone(&scopes),
                config.clone(),
                Arc::clone(&results),
                cancel.clone(),
            );

            pipelines.push(PipelineHandle {
                input: tx,
                results,
                state: pipeline.state_receiver(),
                settled: pipeline.settled_receiver(),
                enqueued: AtomicU64::new(0),
            });
            workers.push(tokio::spawn(pipeline.run(rx)));
        }

        info!(
            "Command queue started (max_retries={}, on_exhaustion={:?})",
            config.max_retries, config.on_exhaustion
        );

        Self {
            pipelines,
            closed: AtomicBool::new(false),
            cancel,
            workers: Mutex::new(workers),
        }
    }

    fn pipeline(&self, kind: CommandKind) -> &PipelineHandle {
        &self.pipelines[kind.index()]
    }

    /// Hand a command to its pipeline without waiting for execution
    ///
    /// `Ok` means the command was queued before shutdown began. Like anything
    /// still queued when `shutdown` runs, it is then discarded with a warning.
    /// A call overlapping `shutdown` returns [`QueueError::Closed`].
    pub fn enqueue(&self, command: Command) -> Result<(), QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        let kind = command.kind();
        let pipeline = self.pipeline(kind);
        debug!("Enqueuing {}", command.describe());

        // Count before sending so the worker can never settle more than was enqueued
        pipeline.enqueued.fetch_add(1, Ordering::AcqRel);
        if pipeline.input.send(command).is_err() {
            pipeline.enqueued.fetch_sub(1, Ordering::AcqRel);
            return Err(if self.closed.load(Ordering::Acquire) {
                QueueError::Closed
            } else {
                QueueError::PipelineHalted(kind)
            });
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    pub fn enqueue_create(&self, task: Task) -> Result<(), QueueError> {
        self.enqueue(Command::Create(task))
    }

    pub fn enqueue_update(&self, task: Task) -> Result<(), QueueError> {
        self.enqueue(Command::Update(task))
    }

    pub fn enqueue_delete(&self, id: TaskId) -> Result<(), QueueError> {
        self.enqueue(Command::Delete(id))
    }

    /// Subscribe to a kind's results from now on
    pub fn results(&self, kind: CommandKind) -> ResultSubscription {
        self.pipeline(kind).results.subscribe()
    }

    pub fn create_results(&self) -> ResultSubscription {
        self.results(CommandKind::Create)
    }

    pub fn update_results(&self) -> ResultSubscription {
        self.results(CommandKind::Update)
    }

    pub fn delete_results(&self) -> ResultSubscription {
        self.results(CommandKind::Delete)
    }

    pub fn state(&self, kind: CommandKind) -> PipelineState {
        *self.pipeline(kind).state.borrow()
    }

    /// Commands of this kind that reached a terminal outcome
    pub fn settled(&self, kind: CommandKind) -> u64 {
        *self.pipeline(kind).settled.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait until every command enqueued so far has settled or its pipeline stopped
    pub async fn wait_until_drained(&self) {
        for pipeline in &self.pipelines {
            let target = pipeline.enqueued.load(Ordering::Acquire);
            let mut settled = pipeline.settled.clone();
            // Err means the pipeline exited; nothing more will settle
            let _ = settled.wait_for(|count| *count >= target).await;
        }
    }

    /// Stop accepting commands, cancel pending work and complete every result stream
    pub async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Shutting down command queue");
        }
        self.cancel.cancel();

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Pipeline worker ended abnormally: {}", e);
            }
        }

        // Covers workers that ended without completing their stream
        for pipeline in &self.pipelines {
            pipeline.results.complete();
        }
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{InMemoryTaskStore, StoreScopeFactory};
    use tokio_test::{assert_err, assert_ok};

    fn queue() -> (InMemoryTaskStore, CommandQueue) {
        let store = InMemoryTaskStore::new();
        let scopes = Arc::new(StoreScopeFactory::new(store.clone()));
        (store, CommandQueue::start(scopes, QueueConfig::default()))
    }

    #[tokio::test]
    async fn test_enqueue_create_publishes_result() {
        let (store, queue) = queue();
        let mut results = queue.create_results();

        assert_ok!(queue.enqueue_create(Task::normal("Plan the sprint")));

        let result = results.next().await.unwrap();
        assert_eq!(result.kind, CommandKind::Create);
        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(store.len().await, 1);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_executor_rejection_is_published_not_retried() {
        let (_store, queue) = queue();
        let mut results = queue.delete_results();

        assert_ok!(queue.enqueue_delete(TaskId(99)));

        let result = results.next().await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message, "task does not exist");
        assert_eq!(result.attempts, 1);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_until_drained_and_states() {
        let (store, queue) = queue();

        for i in 0..3 {
            assert_ok!(queue.enqueue_create(Task::normal(format!("Task number {}", i))));
        }
        queue.wait_until_drained().await;

        assert_eq!(queue.settled(CommandKind::Create), 3);
        assert_eq!(store.len().await, 3);
        assert_eq!(queue.state(CommandKind::Create), PipelineState::Idle);

        queue.shutdown().await;
        for kind in CommandKind::ALL {
            assert_eq!(queue.state(kind), PipelineState::Stopped);
        }
    }

    #[tokio::test]
    async fn test_shutdown_closes_queue() {
        let (_store, queue) = queue();
        queue.shutdown().await;
        queue.shutdown().await;

        assert!(queue.is_closed());
        let err = assert_err!(queue.enqueue_delete(TaskId(1)));
        assert_eq!(err, QueueError::Closed);
        assert!(queue.update_results().next().await.is_none());
    }
}
