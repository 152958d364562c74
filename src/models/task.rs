use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::comment::CommentResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub sort_order: i32,
    pub user_id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A task as returned to clients, with its live comments oldest first.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,
    pub comments: Vec<CommentResponse>,
}

impl TaskResponse {
    pub fn new(task: Task, comments: Vec<CommentResponse>) -> Self {
        Self { task, comments }
    }
}

/// Fields for inserting a task; the creator is always `user_id`.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub user_id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: i64,
    pub not_started: i64,
    pub in_progress: i64,
    pub done: i64,
    pub percent: f64,
}

impl TaskStats {
    pub fn from_counts(total: i64, not_started: i64, in_progress: i64, done: i64) -> Self {
        let percent = if total > 0 {
            done as f64 / total as f64
        } else {
            0.0
        };
        Self {
            total,
            not_started,
            in_progress,
            done,
            percent,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub task_ids: Vec<Uuid>,
}
