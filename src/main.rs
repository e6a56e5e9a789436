use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use task_queue::cli::{run_batch, BatchSummary, Cli};
use task_queue::config::{load_config, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first to get debug flag
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match cli.config {
        Some(path) => load_config(&path)?,
        None => {
            let default_path = PathBuf::from("config.yaml");
            if default_path.exists() {
                load_config(&default_path)?
            } else {
                AppConfig::default()
            }
        }
    };

    println!("🎯 task-queue started");
    println!(
        "🔁 Retry budget: {} (on exhaustion: {:?})",
        config.queue.max_retries, config.queue.on_exhaustion
    );
    println!("📦 Commands in batch: {}", config.commands.len());

    let summary = run_batch(&config).await?;
    print_summary(&summary);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary.tasks)?);
    }

    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    for result in &summary.results {
        let marker = if result.success { "✅" } else { "❌" };
        println!("{} [{}] {}", marker, result.kind, result.message);
    }
    println!(
        "📊 {} enqueued, {} succeeded, {} rejected, {} unfinished",
        summary.enqueued, summary.succeeded, summary.rejected, summary.unfinished
    );
    println!("🗂️ Tasks in store: {}", summary.tasks.len());
}
