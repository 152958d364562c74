use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::task::{
    CreateTaskRequest, Task, TaskResponse, TaskStats, UpdateOrderRequest, UpdateTaskRequest,
};

use super::comments::comments_for_tasks;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/stats", get(stats))
        .route("/api/tasks/order", put(update_order))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".into())
}

async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }

    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (title, description, status, user_id)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(title)
    .bind(&body.description)
    .bind(body.status.unwrap_or_default())
    .bind(auth.user_id)
    .fetch_one(&state.db)
    .await?;

    tracing::debug!(task_id = %task.id, username = %auth.username, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<TaskResponse>>, AppError> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks
         WHERE user_id = $1 AND deleted_at IS NULL
         ORDER BY sort_order, created_at",
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
    let mut comments = comments_for_tasks(&state.db, &ids).await?;

    let tasks = tasks
        .into_iter()
        .map(|task| {
            let task_comments = comments.remove(&task.id).unwrap_or_default();
            TaskResponse::new(task, task_comments)
        })
        .collect();
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, AppError> {
    let task = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(task_not_found)?;

    let comments = comments_for_tasks(&state.db, &[task.id])
        .await?
        .remove(&task.id)
        .unwrap_or_default();
    Ok(Json(TaskResponse::new(task, comments)))
}

async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let title = body.title.as_deref().map(str::trim);
    if title.is_some_and(str::is_empty) {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }

    let task = sqlx::query_as::<_, Task>(
        "UPDATE tasks
         SET title = COALESCE($1, title),
             description = COALESCE($2, description),
             status = COALESCE($3, status),
             updated_at = NOW()
         WHERE id = $4 AND user_id = $5 AND deleted_at IS NULL
         RETURNING *",
    )
    .bind(title)
    .bind(body.description.as_deref())
    .bind(body.status)
    .bind(id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(task_not_found)?;

    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query(
        "UPDATE tasks SET deleted_at = NOW()
         WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(task_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<TaskStats>, AppError> {
    let (total, not_started, in_progress, done): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COUNT(*) FILTER (WHERE status = 'not_started'),
                COUNT(*) FILTER (WHERE status = 'in_progress'),
                COUNT(*) FILTER (WHERE status = 'done')
         FROM tasks WHERE user_id = $1 AND deleted_at IS NULL",
    )
    .bind(auth.user_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(TaskStats::from_counts(total, not_started, in_progress, done)))
}

/// Each id's position in `task_ids` becomes its sort order. Ids the caller
/// does not own are skipped.
async fn update_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateOrderRequest>,
) -> Result<StatusCode, AppError> {
    let mut tx = state.db.begin().await?;

    for (position, task_id) in body.task_ids.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| AppError::BadRequest("Too many tasks to order".into()))?;
        sqlx::query(
            "UPDATE tasks SET sort_order = $1, updated_at = NOW()
             WHERE id = $2 AND user_id = $3 AND deleted_at IS NULL",
        )
        .bind(position)
        .bind(task_id)
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
