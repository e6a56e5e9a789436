use crate::command::Command;
use crate::task::{Task, TaskId, TaskStatus};
use chrono::{Duration, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Task fields as written in the config file
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TaskSpec {
    #[serde(default)]
    pub id: Option<u64>,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub due_in_days: Option<i64>,
    #[serde(default)]
    pub additional_data: Option<String>,
}

impl TaskSpec {
    pub fn to_task(&self) -> Task {
        let mut task = match self.priority {
            Priority::Normal => Task::normal(self.description.clone()),
            Priority::High => Task::high_priority(self.description.clone()),
        };
        task.id = self.id.map(TaskId);
        if let Some(status) = &self.status {
            task.status = status.clone();
        }
        if let Some(days) = self.due_in_days {
            task.due_date = Utc::now() + Duration::days(days);
        }
        if self.additional_data.is_some() {
            task.additional_data = self.additional_data.clone();
        }
        task
    }
}

/// One entry of the `commands:` batch
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CommandSpec {
    Create(TaskSpec),
    Update(TaskSpec),
    Delete(u64),
}

impl CommandSpec {
    pub fn to_command(&self) -> Command {
        match self {
            CommandSpec::Create(spec) => Command::Create(spec.to_task()),
            CommandSpec::Update(spec) => Command::Update(spec.to_task()),
            CommandSpec::Delete(id) => Command::Delete(TaskId(*id)),
        }
    }
}
