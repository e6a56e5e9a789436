//! Task domain entity carried opaquely through the command queue

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a task by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Workflow status of a task
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    HighPriority,
    InProgress,
    Completed,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::HighPriority => "high_priority",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Other(other) => other,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => TaskStatus::Pending,
            "high_priority" => TaskStatus::HighPriority,
            "in_progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Other(value),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work tracked by the task backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: Option<TaskId>,
    pub description: String,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub additional_data: Option<String>,
}

impl Task {
    /// Create a pending task without an id
    pub fn new(description: impl Into<String>, due_date: DateTime<Utc>) -> Self {
        Self {
            id: None,
            description: description.into(),
            due_date,
            status: TaskStatus::Pending,
            additional_data: None,
        }
    }

    /// Standard-priority task due in three days
    pub fn normal(description: impl Into<String>) -> Self {
        Self {
            additional_data: Some("Standard priority task.".to_string()),
            ..Self::new(description, Utc::now() + Duration::days(3))
        }
    }

    /// Urgent task due in twelve hours
    pub fn high_priority(description: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::HighPriority,
            additional_data: Some("This task requires urgent attention.".to_string()),
            ..Self::new(description, Utc::now() + Duration::hours(12))
        }
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Whole days left until the due date; negative once overdue
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.due_date - now).num_days()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_tasks() {
        let now = Utc::now();

        let normal = Task::normal("Write the weekly report");
        assert_eq!(normal.status, TaskStatus::Pending);
        assert_eq!(normal.days_remaining(now), 3);
        assert!(!normal.is_overdue(now));

        let urgent = Task::high_priority("Fix the outage");
        assert_eq!(urgent.status, TaskStatus::HighPriority);
        assert_eq!(urgent.days_remaining(now), 0);
        assert!(urgent.additional_data.unwrap().contains("urgent"));
    }

    #[test]
    fn test_overdue() {
        let now = Utc::now();
        let task = Task::new("Already late", now - Duration::days(2));
        assert!(task.is_overdue(now));
        assert_eq!(task.days_remaining(now), -2);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(TaskStatus::from("in_progress".to_string()), TaskStatus::InProgress);
        assert_eq!(
            TaskStatus::from("Blocked".to_string()),
            TaskStatus::Other("Blocked".to_string())
        );
        assert_eq!(TaskStatus::HighPriority.to_string(), "high_priority");
    }

    #[test]
    fn test_task_serializes_status_as_string() {
        let task = Task::new("Serialize me", Utc::now()).with_id(7u64);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["status"], "pending");
    }
}
