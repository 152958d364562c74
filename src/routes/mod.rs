pub mod auth;
pub mod comments;
pub mod tasks;
pub mod workspaces;

use axum::Router;
use crate::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(tasks::router())
        .merge(comments::router())
        .merge(workspaces::router())
}
