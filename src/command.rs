//! Task mutation commands and their execution results

use crate::task::{Task, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which pipeline a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Create,
    Update,
    Delete,
}

impl CommandKind {
    pub const ALL: [CommandKind; 3] = [CommandKind::Create, CommandKind::Update, CommandKind::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Create => "create",
            CommandKind::Update => "update",
            CommandKind::Delete => "delete",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            CommandKind::Create => 0,
            CommandKind::Update => 1,
            CommandKind::Delete => 2,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task mutation waiting to be executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Create(Task),
    Update(Task),
    Delete(TaskId),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Create(_) => CommandKind::Create,
            Command::Update(_) => CommandKind::Update,
            Command::Delete(_) => CommandKind::Delete,
        }
    }

    /// Short human-readable label used in log lines
    pub fn describe(&self) -> String {
        match self {
            Command::Create(task) => format!("create '{}'", task.description),
            Command::Update(task) => match task.id {
                Some(id) => format!("update #{} '{}'", id, task.description),
                None => format!("update '{}'", task.description),
            },
            Command::Delete(id) => format!("delete #{}", id),
        }
    }
}

/// Outcome of one command, published on its kind's result stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub kind: CommandKind,
    pub success: bool,
    pub message: String,
    /// Number of executor attempts the command consumed
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_command_kind() {
        let task = Task::new("Buy groceries", Utc::now());
        assert_eq!(Command::Create(task.clone()).kind(), CommandKind::Create);
        assert_eq!(Command::Update(task).kind(), CommandKind::Update);
        assert_eq!(Command::Delete(TaskId(3)).kind(), CommandKind::Delete);
    }

    #[test]
    fn test_describe() {
        let task = Task::new("Buy groceries", Utc::now()).with_id(4u64);
        assert_eq!(Command::Update(task).describe(), "update #4 'Buy groceries'");
        assert_eq!(Command::Delete(TaskId(9)).describe(), "delete #9");
    }

    #[test]
    fn test_kind_indices_are_distinct() {
        let indices: Vec<usize> = CommandKind::ALL.iter().map(|k| k.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
