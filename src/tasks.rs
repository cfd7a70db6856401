//! In-memory task registry tracking ingestion lifecycle and progress.
//!
//! Each ingestion request owns exactly one task record, keyed by an opaque id. The pipeline
//! run is the only writer for its record; clients observe it through [`TaskRegistry::get`].
//! Once a task reaches a terminal status no further mutation is applied.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A task with the same identifier has already been registered.
    #[error("task '{0}' already exists")]
    AlreadyExists(String),
}

/// Lifecycle states of an ingestion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, pipeline not yet started.
    Pending,
    /// Pipeline is executing a stage.
    Processing,
    /// All stages finished and at least one document was indexed.
    Completed,
    /// All stages finished but nothing reached the index.
    CompletedWithWarning,
    /// A stage failed and the pipeline halted.
    Failed,
}

impl TaskStatus {
    /// Whether this status ends the task lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithWarning | Self::Failed
        )
    }

    fn can_transition_to(self, next: TaskStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Processing | Self::Failed),
            Self::Processing => matches!(
                next,
                Self::Processing | Self::Completed | Self::CompletedWithWarning | Self::Failed
            ),
            _ => false,
        }
    }
}

/// Point-in-time view of a task record returned to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Coarse completion percentage, non-decreasing while processing.
    pub progress: u8,
    /// Human-readable last-known-state string.
    pub message: String,
}

/// Partial update applied to a task record; omitted fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    /// New lifecycle status, if it changes.
    pub status: Option<TaskStatus>,
    /// New progress percentage, if it changes.
    pub progress: Option<u8>,
    /// New status message, if it changes.
    pub message: Option<String>,
}

impl TaskUpdate {
    /// Progress checkpoint while the task stays in `Processing`.
    pub fn processing(progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Processing),
            progress: Some(progress),
            message: Some(message.into()),
        }
    }

    /// Terminal failure update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            progress: None,
            message: Some(message.into()),
        }
    }
}

/// Registry of ingestion tasks, keyed by task id.
///
/// Construct one instance at startup and share it between the gateway and the pipeline.
/// Records are independent, so a single map-level lock is sufficient; there is no
/// cross-task coordination.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, TaskSnapshot>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task at `Pending`/0%.
    pub fn create(&self, task_id: &str) -> Result<(), TaskError> {
        let mut tasks = self.tasks.write().expect("task registry lock poisoned");
        if tasks.contains_key(task_id) {
            return Err(TaskError::AlreadyExists(task_id.to_string()));
        }
        tasks.insert(
            task_id.to_string(),
            TaskSnapshot {
                status: TaskStatus::Pending,
                progress: 0,
                message: "Task created".to_string(),
            },
        );
        Ok(())
    }

    /// Apply a partial update to a task record.
    ///
    /// Unknown ids are a logged no-op: updates can race with client-side cleanup and must
    /// not fail the pipeline. Updates against terminal records and illegal status
    /// transitions are dropped the same way.
    pub fn update(&self, task_id: &str, update: TaskUpdate) {
        let mut tasks = self.tasks.write().expect("task registry lock poisoned");
        let Some(record) = tasks.get_mut(task_id) else {
            tracing::warn!(task = task_id, "Update for unknown task ignored");
            return;
        };

        if record.status.is_terminal() {
            tracing::warn!(task = task_id, status = ?record.status, "Update after terminal status ignored");
            return;
        }

        if let Some(status) = update.status {
            if !record.status.can_transition_to(status) {
                debug_assert!(false, "invalid task transition {:?} -> {status:?}", record.status);
                tracing::warn!(
                    task = task_id,
                    from = ?record.status,
                    to = ?status,
                    "Invalid task transition ignored"
                );
                return;
            }
            record.status = status;
        }
        if let Some(progress) = update.progress {
            // Progress is monotonic; a stale lower checkpoint never rolls it back.
            record.progress = record.progress.max(progress.min(100));
        }
        if let Some(message) = update.message {
            record.message = message;
        }
    }

    /// Return the current snapshot for a task, if known.
    pub fn get(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.tasks
            .read()
            .expect("task registry lock poisoned")
            .get(task_id)
            .cloned()
    }
}
