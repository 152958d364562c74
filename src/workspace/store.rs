//! Data-access contract for workspaces, memberships and workspace tasks.
//!
//! Implementations hold no business rules. Every read that touches
//! memberships filters out soft-deleted rows and rows whose workspace has
//! been soft-deleted.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::task::{NewTask, Task};
use crate::models::user::UserSummary;
use crate::models::workspace::{MemberDetail, MemberRole, NewWorkspace, Workspace, WorkspaceMember};

pub const INVITE_CODE_CONSTRAINT: &str = "workspaces_invite_code_key";
pub const ACTIVE_MEMBER_CONSTRAINT: &str = "workspace_members_active_key";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A guarded update or soft-delete matched zero rows.
    #[error("record not found")]
    NotFound,
    #[error("invite code already in use")]
    DuplicateInviteCode,
    #[error("user is already an active member of this workspace")]
    DuplicateMember,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                match db.constraint() {
                    Some(INVITE_CODE_CONSTRAINT) => return Self::DuplicateInviteCode,
                    Some(ACTIVE_MEMBER_CONSTRAINT) => return Self::DuplicateMember,
                    _ => {}
                }
            }
        }
        Self::Database(e)
    }
}

#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Insert the workspace and its `owner` membership as one atomic unit.
    async fn create_with_owner(&self, new: NewWorkspace) -> Result<Workspace, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Workspace>, StoreError>;

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Workspace>, StoreError>;

    async fn find_by_member(&self, user_id: Uuid) -> Result<Vec<Workspace>, StoreError>;

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Workspace>, StoreError>;

    /// Persist name and description. `NotFound` if the workspace is gone.
    async fn update_details(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<Workspace, StoreError>;

    /// Soft-delete, re-checking ownership. `NotFound` when no row matches.
    async fn soft_delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), StoreError>;

    async fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<WorkspaceMember, StoreError>;

    async fn find_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceMember>, StoreError>;

    async fn is_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// Active members of several workspaces, keyed by workspace id.
    async fn list_members(
        &self,
        workspace_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<MemberDetail>>, StoreError>;

    /// Soft-delete one membership row. `NotFound` when no active row matches.
    async fn remove_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;

    async fn update_invite_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserSummary>, StoreError>;
}

/// The slice of task persistence the workspace rules depend on.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, new: NewTask) -> Result<Task, StoreError>;

    async fn find_in_workspace(
        &self,
        workspace_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<Task>, StoreError>;

    async fn list_by_workspace(&self, workspace_id: Uuid) -> Result<Vec<Task>, StoreError>;

    async fn set_assignee(
        &self,
        task_id: Uuid,
        assignee_id: Option<Uuid>,
    ) -> Result<Task, StoreError>;
}
