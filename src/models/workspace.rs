use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workspace_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

#[derive(Debug, Clone, FromRow)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub invite_code: String,
    pub invite_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// An absent expiry never lapses.
    pub fn invite_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.invite_expires_at.is_some_and(|expires| expires < now)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct WorkspaceMember {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    // Only inspected by store tests.
    #[cfg_attr(not(test), allow(dead_code))]
    pub joined_at: DateTime<Utc>,
    #[cfg_attr(not(test), allow(dead_code))]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Active membership joined with the member's user row.
#[derive(Debug, Clone, FromRow)]
pub struct MemberDetail {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
}

impl MemberDetail {
    pub fn user(&self) -> UserSummary {
        UserSummary {
            id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    pub fn into_response(self) -> MemberResponse {
        MemberResponse {
            user: self.user(),
            id: self.id,
            user_id: self.user_id,
            role: self.role,
            joined_at: self.joined_at,
        }
    }
}

/// Fields for inserting a workspace together with its owner membership.
#[derive(Debug, Clone)]
pub struct NewWorkspace {
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub invite_code: String,
    pub invite_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub owner: UserSummary,
    pub invite_code: String,
    pub invite_expires_at: Option<DateTime<Utc>>,
    pub members: Vec<MemberResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn into_response(
        self,
        owner: UserSummary,
        members: Vec<MemberDetail>,
    ) -> WorkspaceResponse {
        WorkspaceResponse {
            id: self.id,
            name: self.name,
            description: self.description,
            owner_id: self.owner_id,
            owner,
            invite_code: self.invite_code,
            invite_expires_at: self.invite_expires_at,
            members: members.into_iter().map(MemberDetail::into_response).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InviteCodeResponse {
    pub invite_code: String,
    pub invite_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub description: Option<String>,
    pub invite_expires_in_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkspaceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinWorkspaceRequest {
    pub invite_code: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshInviteParams {
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignee_id: Option<Uuid>,
}

/// `assignee_id: null` unassigns the task.
#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    pub assignee_id: Option<Uuid>,
}
