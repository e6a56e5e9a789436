//! In-memory task store and the task service executor bound to it

use super::{ExecutionError, ExecutionResponse, ExecutionScope, ScopeFactory, TaskExecutor};
use crate::command::Command;
use crate::task::{Task, TaskId, TaskStatus};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const DESCRIPTION_MIN: usize = 5;
const DESCRIPTION_MAX: usize = 500;
const STATUS_MAX: usize = 50;
const ADDITIONAL_DATA_MAX: usize = 1000;

#[derive(Debug, Default)]
struct StoreInner {
    tasks: BTreeMap<TaskId, Task>,
    last_id: u64,
}

/// Shared in-memory task table
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_all(&self) -> Vec<Task> {
        self.inner.read().await.tasks.values().cloned().collect()
    }

    pub async fn get_by_id(&self, id: TaskId) -> Option<Task> {
        self.inner.read().await.tasks.get(&id).cloned()
    }

    pub async fn filter_by_status(&self, status: &TaskStatus) -> Vec<Task> {
        self.inner
            .read()
            .await
            .tasks
            .values()
            .filter(|task| &task.status == status)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn insert(&self, mut task: Task) -> TaskId {
        let mut inner = self.inner.write().await;
        inner.last_id += 1;
        let id = TaskId(inner.last_id);
        task.id = Some(id);
        inner.tasks.insert(id, task);
        id
    }

    async fn replace(&self, id: TaskId, task: Task) -> bool {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&id) {
            Some(slot) => {
                *slot = task;
                true
            }
            None => false,
        }
    }

    async fn remove(&self, id: TaskId) -> bool {
        self.inner.write().await.tasks.remove(&id).is_some()
    }
}

/// Executes task commands against an [`InMemoryTaskStore`]
pub struct TaskService {
    store: InMemoryTaskStore,
}

impl TaskService {
    pub fn new(store: InMemoryTaskStore) -> Self {
        Self { store }
    }

    async fn add(&self, task: &Task) -> ExecutionResponse {
        if let Err(reason) = validate(task) {
            return ExecutionResponse::rejected(format!("task was not saved: {}", reason));
        }
        let id = self.store.insert(task.clone()).await;
        ExecutionResponse::ok(format!("task #{} saved", id))
    }

    async fn update(&self, task: &Task) -> ExecutionResponse {
        let Some(id) = task.id else {
            return ExecutionResponse::rejected("task does not exist");
        };
        if let Err(reason) = validate(task) {
            return ExecutionResponse::rejected(format!("task was not updated: {}", reason));
        }
        if self.store.replace(id, task.clone()).await {
            ExecutionResponse::ok(format!("task #{} updated", id))
        } else {
            ExecutionResponse::rejected("task does not exist")
        }
    }

    async fn delete(&self, id: TaskId) -> ExecutionResponse {
        if self.store.remove(id).await {
            ExecutionResponse::ok(format!("task #{} deleted", id))
        } else {
            ExecutionResponse::rejected("task does not exist")
        }
    }
}

#[async_trait]
impl TaskExecutor for TaskService {
    async fn execute(&self, command: &Command) -> Result<ExecutionResponse, ExecutionError> {
        let response = match command {
            Command::Create(task) => self.add(task).await,
            Command::Update(task) => self.update(task).await,
            Command::Delete(id) => self.delete(*id).await,
        };
        Ok(response)
    }
}

fn validate(task: &Task) -> Result<(), String> {
    let description = task.description.chars().count();
    if !(DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&description) {
        return Err(format!(
            "description must be between {} and {} characters",
            DESCRIPTION_MIN, DESCRIPTION_MAX
        ));
    }
    if task.status.as_str().chars().count() > STATUS_MAX {
        return Err(format!("status must be at most {} characters", STATUS_MAX));
    }
    if let Some(data) = &task.additional_data {
        if data.chars().count() > ADDITIONAL_DATA_MAX {
            return Err(format!(
                "additional data must be at most {} characters",
                ADDITIONAL_DATA_MAX
            ));
        }
    }
    Ok(())
}

struct TaskServiceScope {
    id: u64,
    service: TaskService,
}

impl ExecutionScope for TaskServiceScope {
    fn executor(&self) -> &dyn TaskExecutor {
        &self.service
    }

    fn release(&self) {
        debug!("Released task service scope {}", self.id);
    }
}

/// Opens a fresh [`TaskService`] scope over a shared store for every attempt
pub struct StoreScopeFactory {
    store: InMemoryTaskStore,
    opened: AtomicU64,
}

impl StoreScopeFactory {
    pub fn new(store: InMemoryTaskStore) -> Self {
        Self {
            store,
            opened: AtomicU64::new(0),
        }
    }

    /// How many scopes have been handed out so far
    pub fn scopes_opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }
}

impl ScopeFactory for StoreScopeFactory {
    fn create_scope(&self) -> Result<Box<dyn ExecutionScope>, ExecutionError> {
        let id = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Opened task service scope {}", id);
        Ok(Box::new(TaskServiceScope {
            id,
            service: TaskService::new(self.store.clone()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScopeGuard;
    use chrono::Utc;

    fn service() -> (InMemoryTaskStore, TaskService) {
        let store = InMemoryTaskStore::new();
        (store.clone(), TaskService::new(store))
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let (store, service) = service();

        let first = service
            .execute(&Command::Create(Task::normal("Write the report")))
            .await
            .unwrap();
        let second = service
            .execute(&Command::Create(Task::high_priority("Fix the build")))
            .await
            .unwrap();

        assert!(first.success);
        assert_eq!(first.message, "task #1 saved");
        assert_eq!(second.message, "task #2 saved");
        assert_eq!(store.len().await, 2);
        assert_eq!(
            store.get_by_id(TaskId(2)).await.unwrap().status,
            TaskStatus::HighPriority
        );
    }

    #[tokio::test]
    async fn test_create_rejects_short_description() {
        let (store, service) = service();

        let response = service
            .execute(&Command::Create(Task::normal("abc")))
            .await
            .unwrap();

        assert!(!response.success);
        assert!(response.message.starts_with("task was not saved"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (store, service) = service();
        service
            .execute(&Command::Create(Task::normal("Draft the plan")))
            .await
            .unwrap();

        let updated = Task::new("Finalize the plan", Utc::now())
            .with_id(1u64)
            .with_status(TaskStatus::InProgress);
        let response = service.execute(&Command::Update(updated)).await.unwrap();
        assert!(response.success);
        assert_eq!(
            store.filter_by_status(&TaskStatus::InProgress).await.len(),
            1
        );

        let response = service.execute(&Command::Delete(TaskId(1))).await.unwrap();
        assert!(response.success);
        assert!(store.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_task_is_rejected() {
        let (_store, service) = service();

        let update = service
            .execute(&Command::Update(Task::normal("Nobody home").with_id(42u64)))
            .await
            .unwrap();
        let delete = service.execute(&Command::Delete(TaskId(42))).await.unwrap();

        assert_eq!(update, ExecutionResponse::rejected("task does not exist"));
        assert_eq!(delete, ExecutionResponse::rejected("task does not exist"));
    }

    #[test]
    fn test_scope_factory_counts_scopes() {
        let factory = StoreScopeFactory::new(InMemoryTaskStore::new());
        let first = ScopeGuard::new(factory.create_scope().unwrap());
        let second = ScopeGuard::new(factory.create_scope().unwrap());
        drop(first);
        drop(second);
        assert_eq!(factory.scopes_opened(), 2);
    }
}
