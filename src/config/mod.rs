pub mod batch;
pub mod loader;
pub mod queue_config;

pub use batch::{CommandSpec, Priority, TaskSpec};
pub use loader::{load_config, parse_config, AppConfig};
pub use queue_config::{ExhaustionPolicy, QueueConfig};
