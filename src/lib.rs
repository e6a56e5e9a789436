pub mod cli;
pub mod command;
pub mod config;
pub mod executor;
pub mod notify;
pub mod queue;
pub mod task;

// Public API
pub use command::{Command, CommandKind, ExecutionResult};
pub use config::{load_config, AppConfig, ExhaustionPolicy, QueueConfig};
pub use executor::{
    ExecutionError, ExecutionResponse, ExecutionScope, InMemoryTaskStore, ScopeFactory,
    ScopeGuard, StoreScopeFactory, TaskExecutor,
};
pub use notify::{
    spawn_logging_subscriber, spawn_notification_subscriber, LoggingNotifier, NotifyError,
    TaskNotifier,
};
pub use queue::{
    create_shared_queue, CommandQueue, PipelineState, QueueError, ResultSubscription,
    SharedCommandQueue,
};
pub use task::{Task, TaskId, TaskStatus};
