pub mod args;
pub mod runner;

pub use args::Cli;
pub use runner::{run_batch, BatchSummary};
