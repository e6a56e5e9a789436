//! Broadcast result streams, one per command kind

use crate::command::{CommandKind, ExecutionResult};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Fans every published result out to all currently attached listeners
///
/// Listeners only see results published after they subscribe. Completing the
/// stream drops every sender, so each subscription ends once it has drained
/// what it already received.
#[derive(Debug)]
pub struct ResultStream {
    kind: CommandKind,
    /// `None` once the stream has completed
    listeners: Mutex<Option<Vec<UnboundedSender<ExecutionResult>>>>,
}

impl ResultStream {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            listeners: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    fn listeners(&self) -> MutexGuard<'_, Option<Vec<UnboundedSender<ExecutionResult>>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a new listener
    pub fn subscribe(&self) -> ResultSubscription {
        let (tx, rx) = mpsc::unbounded_channel();

        // A completed stream hands out a subscription that is already finished
        if let Some(listeners) = self.listeners().as_mut() {
            listeners.push(tx);
        }

        ResultSubscription {
            kind: self.kind,
            receiver: rx,
        }
    }

    /// Deliver a result to every listener, returning how many received it
    pub fn publish(&self, result: ExecutionResult) -> usize {
        let mut guard = self.listeners();
        let Some(listeners) = guard.as_mut() else {
            debug!("Dropping {} result on completed stream", self.kind);
            return 0;
        };

        // Remove disconnected listeners
        listeners.retain(|sender| sender.send(result.clone()).is_ok());
        listeners.len()
    }

    /// Signal end-of-stream to every listener; idempotent
    pub fn complete(&self) {
        if self.listeners().take().is_some() {
            debug!("Completed {} result stream", self.kind);
        }
    }

    pub fn is_completed(&self) -> bool {
        self.listeners().is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners().as_ref().map_or(0, Vec::len)
    }
}

/// One listener's view of a [`ResultStream`]
#[derive(Debug)]
pub struct ResultSubscription {
    kind: CommandKind,
    receiver: UnboundedReceiver<ExecutionResult>,
}

impl ResultSubscription {
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Wait for the next result; `None` once the stream has completed
    pub async fn next(&mut self) -> Option<ExecutionResult> {
        self.receiver.recv().await
    }

    /// Take an already delivered result without waiting
    pub fn try_next(&mut self) -> Option<ExecutionResult> {
        self.receiver.try_recv().ok()
    }

    /// True once the stream completed and every delivered result was read
    pub fn is_finished(&mut self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Read until the stream completes
    pub async fn collect(mut self) -> Vec<ExecutionResult> {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(message: &str) -> ExecutionResult {
        ExecutionResult {
            kind: CommandKind::Create,
            success: true,
            message: message.to_string(),
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_same_sequence() {
        let stream = ResultStream::new(CommandKind::Create);
        let first = stream.subscribe();
        let second = stream.subscribe();

        assert_eq!(stream.publish(result("one")), 2);
        assert_eq!(stream.publish(result("two")), 2);
        stream.complete();

        let first: Vec<String> = first.collect().await.into_iter().map(|r| r.message).collect();
        let second: Vec<String> = second.collect().await.into_iter().map(|r| r.message).collect();
        assert_eq!(first, vec!["one", "two"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_replay() {
        let stream = ResultStream::new(CommandKind::Update);
        stream.publish(result("before"));

        let mut late = stream.subscribe();
        stream.publish(result("after"));

        assert_eq!(late.next().await.unwrap().message, "after");
        assert!(late.try_next().is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let stream = ResultStream::new(CommandKind::Delete);
        let kept = stream.subscribe();
        drop(stream.subscribe());

        assert_eq!(stream.publish(result("x")), 1);
        assert_eq!(stream.subscriber_count(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn test_complete_is_idempotent_and_final() {
        let stream = ResultStream::new(CommandKind::Create);
        let mut sub = stream.subscribe();

        stream.complete();
        stream.complete();

        assert!(stream.is_completed());
        assert_eq!(stream.publish(result("ignored")), 0);
        assert!(sub.next().await.is_none());
        assert!(stream.subscribe().is_finished());
    }
}
