/// Task and task comment models
///
/// # Status Lifecycle
///
/// ```text
/// todo → in_progress → review → done
///   ↑         ↓           ↓
///   └─────────┴───────────┘ (reopen)
/// ```
///
/// `done` is terminal except for an explicit reopen to `todo`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'review', 'done');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     project_id UUID NOT NULL REFERENCES projects(id),
///     title VARCHAR(200) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'todo',
///     owner_id UUID NOT NULL REFERENCES users(id),
///     assignee_id UUID REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Entity;

/// Task status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    Todo,

    /// Being worked on
    InProgress,

    /// Waiting for review
    Review,

    /// Finished
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }

    /// Checks if transition to target status is valid
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        match (self, target) {
            (TaskStatus::Todo, TaskStatus::InProgress) => true,

            (TaskStatus::InProgress, TaskStatus::Review) => true,
            (TaskStatus::InProgress, TaskStatus::Todo) => true,

            (TaskStatus::Review, TaskStatus::Done) => true,
            (TaskStatus::Review, TaskStatus::InProgress) => true,

            // Reopen
            (TaskStatus::Done, TaskStatus::Todo) => true,

            _ => false,
        }
    }
}

/// Task within a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    pub project_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    pub status: TaskStatus,

    /// Creator of the task
    pub owner_id: Uuid,

    pub assignee_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(project_id: Uuid, title: impl Into<String>, owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            owner_id,
            assignee_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn assign(&mut self, assignee_id: Option<Uuid>) {
        self.assignee_id = assignee_id;
        self.updated_at = Utc::now();
    }

    /// Moves the task to `status` if the lifecycle allows it
    ///
    /// Returns `false` and leaves the task untouched otherwise.
    pub fn set_status(&mut self, status: TaskStatus) -> bool {
        if !self.status.can_transition_to(status) {
            return false;
        }
        self.status = status;
        self.updated_at = Utc::now();
        true
    }
}

impl Entity for Task {
    const NAME: &'static str = "Task";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Comment left on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskComment {
    pub id: Uuid,

    pub task_id: Uuid,

    pub author_id: Uuid,

    pub body: String,

    pub created_at: DateTime<Utc>,
}

impl TaskComment {
    pub fn new(task_id: Uuid, author_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            author_id,
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

impl Entity for TaskComment {
    const NAME: &'static str = "TaskComment";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_as_str() {
        assert_eq!(TaskStatus::Todo.as_str(), "todo");
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
        assert_eq!(TaskStatus::Review.as_str(), "review");
        assert_eq!(TaskStatus::Done.as_str(), "done");
    }

    #[test]
    fn test_task_status_transitions() {
        assert!(TaskStatus::Todo.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Todo.can_transition_to(TaskStatus::Done));

        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Review));
        assert!(TaskStatus::Review.can_transition_to(TaskStatus::Done));

        // Reopen only goes back to todo
        assert!(TaskStatus::Done.can_transition_to(TaskStatus::Todo));
        assert!(!TaskStatus::Done.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn test_set_status_rejects_invalid_transition() {
        let mut task = Task::new(Uuid::new_v4(), "Write docs", Uuid::new_v4());
        assert!(!task.set_status(TaskStatus::Done));
        assert_eq!(task.status, TaskStatus::Todo);

        assert!(task.set_status(TaskStatus::InProgress));
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
