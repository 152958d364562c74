use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::task::Task;
use crate::models::workspace::{
    AssignTaskRequest, CreateWorkspaceRequest, CreateWorkspaceTaskRequest, InviteCodeResponse,
    JoinWorkspaceRequest, RefreshInviteParams, UpdateWorkspaceRequest, WorkspaceResponse,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/workspaces", get(list_workspaces).post(create_workspace))
        .route("/api/workspaces/join", post(join_workspace))
        .route(
            "/api/workspaces/{id}",
            get(get_workspace).put(update_workspace).delete(delete_workspace),
        )
        .route("/api/workspaces/{id}/invite/refresh", post(refresh_invite))
        .route("/api/workspaces/{id}/members/{user_id}", delete(remove_member))
        .route(
            "/api/workspaces/{id}/tasks",
            get(list_tasks).post(create_task),
        )
        .route("/api/workspaces/{id}/tasks/{task_id}/assign", put(assign_task))
}

#[derive(Debug, Deserialize)]
struct ListWorkspacesParams {
    #[serde(default)]
    owned: bool,
}

async fn create_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<WorkspaceResponse>), AppError> {
    let workspace = state.workspaces.create_workspace(auth.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

async fn list_workspaces(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListWorkspacesParams>,
) -> Result<Json<Vec<WorkspaceResponse>>, AppError> {
    let workspaces = if params.owned {
        state.workspaces.list_owned_workspaces(auth.user_id).await?
    } else {
        state.workspaces.list_workspaces(auth.user_id).await?
    };
    Ok(Json(workspaces))
}

async fn get_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkspaceResponse>, AppError> {
    Ok(Json(state.workspaces.get_workspace(id, auth.user_id).await?))
}

async fn update_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateWorkspaceRequest>,
) -> Result<Json<WorkspaceResponse>, AppError> {
    Ok(Json(
        state.workspaces.update_workspace(id, auth.user_id, body).await?,
    ))
}

async fn delete_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.workspaces.delete_workspace(id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn join_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<JoinWorkspaceRequest>,
) -> Result<Json<WorkspaceResponse>, AppError> {
    Ok(Json(
        state
            .workspaces
            .join_by_invite_code(&body.invite_code, auth.user_id)
            .await?,
    ))
}

async fn refresh_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<RefreshInviteParams>,
) -> Result<Json<InviteCodeResponse>, AppError> {
    Ok(Json(
        state
            .workspaces
            .refresh_invite_code(id, auth.user_id, params.expires_in_hours)
            .await?,
    ))
}

async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .workspaces
        .remove_member(id, auth.user_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(state.workspaces.list_tasks(id, auth.user_id).await?))
}

async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateWorkspaceTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let task = state.workspaces.create_task(id, auth.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn assign_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, task_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<AssignTaskRequest>,
) -> Result<Json<Task>, AppError> {
    Ok(Json(
        state
            .workspaces
            .assign_task(id, task_id, auth.user_id, body.assignee_id)
            .await?,
    ))
}
