//! Executor contract consumed by the command queue
//!
//! The queue never talks to persistence directly. For every attempt it asks a
//! [`ScopeFactory`] for a fresh [`ExecutionScope`], runs the command through the
//! scope's [`TaskExecutor`], then releases the scope through a [`ScopeGuard`].

pub mod memory;

pub use memory::{InMemoryTaskStore, StoreScopeFactory, TaskService};

use crate::command::Command;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Command execution failed: {0}")]
    Failed(String),
    #[error("Execution scope unavailable: {0}")]
    ScopeUnavailable(String),
    #[error("Attempt timed out after {0:?}")]
    TimedOut(Duration),
}

/// What the executor reports for a command it ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResponse {
    pub success: bool,
    pub message: String,
}

impl ExecutionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Performs a create/update/delete against the task store
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, command: &Command) -> Result<ExecutionResponse, ExecutionError>;
}

/// A unit-of-work scope owning one executor instance
pub trait ExecutionScope: Send + Sync {
    fn executor(&self) -> &dyn TaskExecutor;

    /// Called exactly once when the attempt is over, whatever its outcome
    fn release(&self) {}
}

/// Releases its scope when dropped, including on cancellation and unwinding
pub struct ScopeGuard {
    scope: Box<dyn ExecutionScope>,
}

impl ScopeGuard {
    pub fn new(scope: Box<dyn ExecutionScope>) -> Self {
        Self { scope }
    }

    pub fn executor(&self) -> &dyn TaskExecutor {
        self.scope.executor()
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.release();
    }
}

/// Hands out independent scopes; shared by all pipelines
pub trait ScopeFactory: Send + Sync {
    fn create_scope(&self) -> Result<Box<dyn ExecutionScope>, ExecutionError>;
}
