use crate::command::Command;
use crate::config::batch::CommandSpec;
use crate::config::queue_config::QueueConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure matching config.yaml format
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

impl AppConfig {
    pub fn commands(&self) -> Vec<Command> {
        self.commands.iter().map(CommandSpec::to_command).collect()
    }
}

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse configuration from YAML text; an empty document yields defaults
pub fn parse_config(content: &str) -> Result<AppConfig> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(content).with_context(|| "Failed to parse YAML config file")
}
