use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::PgPool;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::comment::{
    Comment, CommentResponse, CreateCommentRequest, UpdateCommentRequest,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/comments", post(create_comment))
        .route(
            "/api/comments/{id}",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
        .route("/api/tasks/{id}/comments", get(list_task_comments))
}

const COMMENT_SELECT: &str = "SELECT c.id, c.content, c.task_id, c.user_id, u.username, u.email,
        c.created_at, c.updated_at
     FROM comments c
     JOIN users u ON u.id = c.user_id";

fn not_found_or_not_author() -> AppError {
    AppError::NotFound("Comment not found or not authorized".into())
}

/// Workspace tasks are visible only to active members of a live workspace,
/// whoever created or was assigned them. Personal tasks belong to their creator.
fn task_visible_to(
    creator_id: Uuid,
    workspace_id: Option<Uuid>,
    caller_id: Uuid,
    is_active_member: bool,
) -> bool {
    match workspace_id {
        Some(_) => is_active_member,
        None => creator_id == caller_id,
    }
}

async fn ensure_task_visible(db: &PgPool, task_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let row: Option<(Uuid, Option<Uuid>, bool)> = sqlx::query_as(
        "SELECT t.user_id, t.workspace_id,
                EXISTS (
                    SELECT 1 FROM workspace_members m
                    JOIN workspaces w ON w.id = m.workspace_id AND w.deleted_at IS NULL
                    WHERE m.workspace_id = t.workspace_id
                      AND m.user_id = $2 AND m.deleted_at IS NULL)
         FROM tasks t
         WHERE t.id = $1 AND t.deleted_at IS NULL",
    )
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    match row {
        Some((creator_id, workspace_id, is_member))
            if task_visible_to(creator_id, workspace_id, user_id, is_member) =>
        {
            Ok(())
        }
        _ => Err(AppError::NotFound("Task not found".into())),
    }
}

async fn fetch_comment(db: &PgPool, id: Uuid) -> Result<Option<Comment>, AppError> {
    let comment = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.id = $1 AND c.deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(comment)
}

/// Live comments for each of `task_ids`, oldest first. Tasks without
/// comments are absent from the map.
pub(crate) async fn comments_for_tasks(
    db: &PgPool,
    task_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<CommentResponse>>, AppError> {
    if task_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT}
         WHERE c.task_id = ANY($1) AND c.deleted_at IS NULL
         ORDER BY c.created_at"
    ))
    .bind(task_ids)
    .fetch_all(db)
    .await?;

    Ok(group_by_task(comments))
}

fn group_by_task(comments: Vec<Comment>) -> HashMap<Uuid, Vec<CommentResponse>> {
    let mut grouped: HashMap<Uuid, Vec<CommentResponse>> = HashMap::new();
    for comment in comments {
        grouped
            .entry(comment.task_id)
            .or_default()
            .push(comment.into());
    }
    grouped
}

fn require_content(content: &str) -> Result<&str, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Content cannot be empty".into()));
    }
    Ok(content)
}

async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let content = require_content(&body.content)?;
    ensure_task_visible(&state.db, body.task_id, auth.user_id).await?;

    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO comments (content, task_id, user_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(content)
    .bind(body.task_id)
    .bind(auth.user_id)
    .fetch_one(&state.db)
    .await?;

    let comment = fetch_comment(&state.db, id)
        .await?
        .ok_or_else(|| AppError::Internal("Comment vanished after insert".into()))?;

    Ok((StatusCode::CREATED, Json(comment.into())))
}

async fn list_task_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    ensure_task_visible(&state.db, task_id, auth.user_id).await?;

    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.task_id = $1 AND c.deleted_at IS NULL ORDER BY c.created_at"
    ))
    .bind(task_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

async fn get_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CommentResponse>, AppError> {
    let comment = fetch_comment(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))?;
    ensure_task_visible(&state.db, comment.task_id, auth.user_id).await?;

    Ok(Json(comment.into()))
}

async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let content = require_content(&body.content)?;

    let result = sqlx::query(
        "UPDATE comments SET content = $1, updated_at = NOW()
         WHERE id = $2 AND user_id = $3 AND deleted_at IS NULL",
    )
    .bind(content)
    .bind(id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_found_or_not_author());
    }

    let comment = fetch_comment(&state.db, id)
        .await?
        .ok_or_else(not_found_or_not_author)?;
    Ok(Json(comment.into()))
}

async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query(
        "UPDATE comments SET deleted_at = NOW()
         WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_found_or_not_author());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("")]
    #[case("  \n")]
    fn blank_content_is_rejected(#[case] content: &str) {
        assert!(matches!(require_content(content), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn content_is_trimmed() {
        assert_eq!(require_content("  nice work ").unwrap(), "nice work");
    }

    enum Caller {
        Creator,
        Other,
    }

    #[rstest]
    #[case::personal_task_creator(false, Caller::Creator, false, true)]
    #[case::personal_task_stranger(false, Caller::Other, false, false)]
    #[case::workspace_member(true, Caller::Other, true, true)]
    #[case::removed_assignee(true, Caller::Other, false, false)]
    #[case::removed_creator(true, Caller::Creator, false, false)]
    #[case::creator_still_member(true, Caller::Creator, true, true)]
    fn task_visibility(
        #[case] in_workspace: bool,
        #[case] caller: Caller,
        #[case] is_active_member: bool,
        #[case] expected: bool,
    ) {
        let creator = Uuid::new_v4();
        let caller = match caller {
            Caller::Creator => creator,
            Caller::Other => Uuid::new_v4(),
        };
        let workspace_id = in_workspace.then(Uuid::new_v4);

        assert_eq!(
            task_visible_to(creator, workspace_id, caller, is_active_member),
            expected
        );
    }

    fn comment_on(task_id: Uuid, content: &str) -> Comment {
        let now = chrono::Utc::now();
        Comment {
            id: Uuid::new_v4(),
            content: content.into(),
            task_id,
            user_id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn comments_are_grouped_per_task_in_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let grouped = group_by_task(vec![
            comment_on(first, "one"),
            comment_on(second, "two"),
            comment_on(first, "three"),
        ]);

        let contents: Vec<&str> = grouped[&first].iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["one", "three"]);
        assert_eq!(grouped[&second].len(), 1);
        assert!(!grouped.contains_key(&Uuid::new_v4()));
    }
}
