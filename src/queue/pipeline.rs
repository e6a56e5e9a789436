//! Single-flight retrying pipeline for one command kind

use super::results::ResultStream;
use crate::command::{Command, CommandKind, ExecutionResult};
use crate::config::{ExhaustionPolicy, QueueConfig};
use crate::executor::{ExecutionError, ExecutionResponse, ScopeFactory, ScopeGuard};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Processing,
    /// `attempt` counts retries, starting at 1
    Retrying { attempt: u32 },
    FailedTerminal,
    Stopped,
}

enum AttemptOutcome {
    Finished(Result<ExecutionResponse, ExecutionError>),
    Cancelled,
}

enum ItemOutcome {
    Completed(ExecutionResult),
    Exhausted,
    Cancelled,
}

/// Consumes one kind's input channel and executes each command to a terminal outcome
///
/// Commands are taken strictly in arrival order and the next command is not
/// received until the current one has succeeded, been rejected by the
/// executor, or exhausted its retries.
pub struct RetryingPipeline {
    kind: CommandKind,
    scopes: Arc<dyn ScopeFactory>,
    config: QueueConfig,
    results: Arc<ResultStream>,
    state: watch::Sender<PipelineState>,
    settled: watch::Sender<u64>,
    cancel: CancellationToken,
}

impl RetryingPipeline {
    pub fn new(
        kind: CommandKind,
        scopes: Arc<dyn ScopeFactory>,
        config: QueueConfig,
        results: Arc<ResultStream>,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        let (settled, _) = watch::channel(0);
        Self {
            kind,
            scopes,
            config,
            results,
            state,
            settled,
            cancel,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Observe state transitions
    pub fn state_receiver(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Observe how many commands reached a terminal outcome
    pub fn settled_receiver(&self) -> watch::Receiver<u64> {
        self.settled.subscribe()
    }

    fn set_state(&self, state: PipelineState) {
        self.state.send_replace(state);
    }

    fn mark_settled(&self) {
        self.settled.send_modify(|count| *count += 1);
    }

    /// Run until the input closes, the queue is cancelled, or the stream halts
    pub async fn run(self, mut input: UnboundedReceiver<Command>) {
        info!("Starting {} pipeline", self.kind);
        let mut halted = false;

        loop {
            let command = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = input.recv() => match next {
                    Some(command) => command,
                    None => break,
                },
            };

            match self.process(&command).await {
                ItemOutcome::Completed(result) => {
                    // Subscribers reacting to the result already see it settled
                    self.set_state(PipelineState::Idle);
                    self.mark_settled();
                    self.results.publish(result);
                }
                ItemOutcome::Exhausted => {
                    self.set_state(PipelineState::FailedTerminal);
                    if self.config.on_exhaustion == ExhaustionPolicy::CloseStream {
                        error!(
                            "Closing {} result stream after {} exhausted its retries",
                            self.kind,
                            command.describe()
                        );
                        halted = true;
                        self.mark_settled();
                        break;
                    }
                    self.set_state(PipelineState::Idle);
                    self.mark_settled();
                }
                ItemOutcome::Cancelled => {
                    debug!("Abandoned in-flight {} on shutdown", command.describe());
                    break;
                }
            }
        }

        input.close();
        let mut discarded = 0;
        while input.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            warn!(
                "Discarded {} queued {} command(s) that never started",
                discarded, self.kind
            );
        }

        self.results.complete();
        if !halted {
            self.set_state(PipelineState::Stopped);
        }
        info!("Stopped {} pipeline", self.kind);
    }

    /// Execute one command with bounded retry
    async fn process(&self, command: &Command) -> ItemOutcome {
        let max_retries = self.config.max_retries;
        let mut retry = 0;

        loop {
            self.set_state(if retry == 0 {
                PipelineState::Processing
            } else {
                PipelineState::Retrying { attempt: retry }
            });
            let attempts = retry + 1;
            debug!("Executing {} (attempt {})", command.describe(), attempts);

            match self.attempt(command).await {
                AttemptOutcome::Cancelled => return ItemOutcome::Cancelled,
                AttemptOutcome::Finished(Ok(response)) => {
                    debug!(
                        "Executed {} after {} attempt(s): {}",
                        command.describe(),
                        attempts,
                        response.message
                    );
                    return ItemOutcome::Completed(ExecutionResult {
                        kind: self.kind,
                        success: response.success,
                        message: response.message,
                        attempts,
                    });
                }
                AttemptOutcome::Finished(Err(e)) => {
                    warn!(
                        "Attempt {} of {} failed: {}",
                        attempts,
                        command.describe(),
                        e
                    );
                    if retry >= max_retries {
                        error!(
                            "Giving up on {} after {} attempt(s): {}",
                            command.describe(),
                            attempts,
                            e
                        );
                        return ItemOutcome::Exhausted;
                    }
                }
            }

            retry += 1;
            let delay = self.config.backoff_for(retry);
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return ItemOutcome::Cancelled,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    /// One executor call inside its own scope
    ///
    /// A panicking executor counts as a failed attempt.
    async fn attempt(&self, command: &Command) -> AttemptOutcome {
        let scope = match self.scopes.create_scope() {
            Ok(scope) => ScopeGuard::new(scope),
            Err(e) => return AttemptOutcome::Finished(Err(e)),
        };

        let outcome = {
            let call = async {
                let execution = AssertUnwindSafe(async { scope.executor().execute(command).await })
                    .catch_unwind()
                    .map(|caught| caught.unwrap_or_else(|panic| Err(panic_error(panic))));
                match self.config.attempt_timeout() {
                    Some(limit) => tokio::time::timeout(limit, execution)
                        .await
                        .unwrap_or(Err(ExecutionError::TimedOut(limit))),
                    None => execution.await,
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => AttemptOutcome::Cancelled,
                result = call => AttemptOutcome::Finished(result),
            }
        };

        drop(scope);
        outcome
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> ExecutionError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    ExecutionError::Failed(format!("executor panicked: {}", message))
}
