//! Command queue for serialized, retried task mutations
//!
//! This module provides the asynchronous queue subsystem:
//! - One FIFO pipeline per command kind, executing one command at a time
//! - Bounded retry of failed executor attempts
//! - Broadcast result streams per kind
//! - Scoped teardown that cancels pending work and completes the streams

pub mod manager;
pub mod pipeline;
pub mod results;

pub use manager::CommandQueue;
pub use pipeline::{PipelineState, RetryingPipeline};
pub use results::{ResultStream, ResultSubscription};

use crate::command::CommandKind;
use crate::config::QueueConfig;
use crate::executor::ScopeFactory;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("Command queue is closed")]
    Closed,
    #[error("The {0} pipeline has stopped and accepts no more commands")]
    PipelineHalted(CommandKind),
}

/// Process-wide queue handle shared by all producers
pub type SharedCommandQueue = Arc<CommandQueue>;

/// Start the queue once and hand out clones of the shared handle
pub fn create_shared_queue(scopes: Arc<dyn ScopeFactory>, config: QueueConfig) -> SharedCommandQueue {
    Arc::new(CommandQueue::start(scopes, config))
}
