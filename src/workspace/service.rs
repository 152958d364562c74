use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::task::{NewTask, Task, TaskStatus};
use crate::models::workspace::{
    CreateWorkspaceRequest, CreateWorkspaceTaskRequest, InviteCodeResponse, MemberRole,
    NewWorkspace, UpdateWorkspaceRequest, Workspace, WorkspaceResponse,
};

use super::invite;
use super::store::{StoreError, TaskStore, WorkspaceStore};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("{0}")]
    Validation(String),
    /// Missing and inaccessible are deliberately indistinguishable.
    #[error("Workspace not found or access denied")]
    NotFoundOrForbidden,
    #[error("{0}")]
    Forbidden(String),
    #[error("You are already a member of this workspace")]
    AlreadyMember,
    #[error("Invalid invite code")]
    InvalidInviteCode,
    #[error("Invite code has expired")]
    InviteExpired,
    #[error("The owner cannot be removed from the workspace")]
    OwnerNotRemovable,
    #[error("User is not a member of this workspace")]
    MemberNotFound,
    #[error("Assignee is not a member of this workspace")]
    AssigneeNotMember,
    #[error("Task not found in this workspace")]
    TaskNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Workspace rules: ownership, membership, invites and in-workspace tasks.
///
/// Every operation takes the already-authenticated caller's user id.
#[derive(Clone)]
pub struct WorkspaceService {
    workspaces: Arc<dyn WorkspaceStore>,
    tasks: Arc<dyn TaskStore>,
}

impl WorkspaceService {
    pub fn new(workspaces: Arc<dyn WorkspaceStore>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { workspaces, tasks }
    }

    pub async fn create_workspace(
        &self,
        owner_id: Uuid,
        req: CreateWorkspaceRequest,
    ) -> Result<WorkspaceResponse, WorkspaceError> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(WorkspaceError::Validation("Workspace name is required".into()));
        }
        let description = req.description.unwrap_or_default();
        let invite_expires_at = invite::expiry_from_hours(req.invite_expires_in_hours, Utc::now())?;

        let workspace = invite::with_fresh_code(|invite_code| {
            self.workspaces.create_with_owner(NewWorkspace {
                name: name.clone(),
                description: description.clone(),
                owner_id,
                invite_code,
                invite_expires_at,
            })
        })
        .await?;

        tracing::info!(workspace_id = %workspace.id, owner_id = %owner_id, "workspace created");
        self.view(workspace).await
    }

    pub async fn get_workspace(
        &self,
        workspace_id: Uuid,
        caller_id: Uuid,
    ) -> Result<WorkspaceResponse, WorkspaceError> {
        if !self.workspaces.is_member(workspace_id, caller_id).await? {
            return Err(WorkspaceError::NotFoundOrForbidden);
        }
        let workspace = self
            .workspaces
            .find_by_id(workspace_id)
            .await?
            .ok_or(WorkspaceError::NotFoundOrForbidden)?;
        self.view(workspace).await
    }

    /// Every workspace the caller belongs to, in any role.
    pub async fn list_workspaces(
        &self,
        caller_id: Uuid,
    ) -> Result<Vec<WorkspaceResponse>, WorkspaceError> {
        let workspaces = self.workspaces.find_by_member(caller_id).await?;
        self.views(workspaces).await
    }

    pub async fn list_owned_workspaces(
        &self,
        caller_id: Uuid,
    ) -> Result<Vec<WorkspaceResponse>, WorkspaceError> {
        let workspaces = self.workspaces.find_by_owner(caller_id).await?;
        self.views(workspaces).await
    }

    /// Owner only. A blank name keeps the old one; the description is always replaced.
    pub async fn update_workspace(
        &self,
        workspace_id: Uuid,
        caller_id: Uuid,
        req: UpdateWorkspaceRequest,
    ) -> Result<WorkspaceResponse, WorkspaceError> {
        let workspace = self.owned_workspace(workspace_id, caller_id).await?;

        let name = req
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or(workspace.name);
        let description = req.description.unwrap_or_default();

        let updated = self
            .workspaces
            .update_details(workspace_id, &name, &description)
            .await
            .map_err(not_found_as(WorkspaceError::NotFoundOrForbidden))?;
        self.view(updated).await
    }

    pub async fn delete_workspace(
        &self,
        workspace_id: Uuid,
        caller_id: Uuid,
    ) -> Result<(), WorkspaceError> {
        self.owned_workspace(workspace_id, caller_id).await?;
        self.workspaces
            .soft_delete(workspace_id, caller_id)
            .await
            .map_err(not_found_as(WorkspaceError::NotFoundOrForbidden))?;

        tracing::info!(workspace_id = %workspace_id, "workspace deleted");
        Ok(())
    }

    pub async fn join_by_invite_code(
        &self,
        code: &str,
        caller_id: Uuid,
    ) -> Result<WorkspaceResponse, WorkspaceError> {
        let code = invite::normalize(code);
        if code.is_empty() {
            return Err(WorkspaceError::Validation("Invite code is required".into()));
        }
        if !invite::is_well_formed(&code) {
            return Err(WorkspaceError::InvalidInviteCode);
        }

        let workspace = self
            .workspaces
            .find_by_invite_code(&code)
            .await?
            .ok_or(WorkspaceError::InvalidInviteCode)?;

        if workspace.invite_expired_at(Utc::now()) {
            return Err(WorkspaceError::InviteExpired);
        }

        // Fast path only; the store's unique index settles concurrent joins.
        if self.workspaces.is_member(workspace.id, caller_id).await? {
            return Err(WorkspaceError::AlreadyMember);
        }

        let member = self
            .workspaces
            .add_member(workspace.id, caller_id, MemberRole::Member)
            .await
            .map_err(|e| match e {
                StoreError::DuplicateMember => WorkspaceError::AlreadyMember,
                other => other.into(),
            })?;

        tracing::info!(
            workspace_id = %member.workspace_id,
            user_id = %member.user_id,
            member_id = %member.id,
            "member joined"
        );
        self.view(workspace).await
    }

    /// Owner only. Assignments held by the removed user are left in place.
    pub async fn remove_member(
        &self,
        workspace_id: Uuid,
        caller_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<(), WorkspaceError> {
        let workspace = self
            .workspaces
            .find_by_id(workspace_id)
            .await?
            .ok_or(WorkspaceError::NotFoundOrForbidden)?;

        if workspace.owner_id == target_user_id {
            return Err(WorkspaceError::OwnerNotRemovable);
        }
        if !workspace.is_owned_by(caller_id) {
            return Err(WorkspaceError::NotFoundOrForbidden);
        }

        self.workspaces
            .remove_member(workspace_id, target_user_id)
            .await
            .map_err(not_found_as(WorkspaceError::MemberNotFound))?;

        tracing::info!(workspace_id = %workspace_id, user_id = %target_user_id, "member removed");
        Ok(())
    }

    /// Owner only. The previous code stops working immediately.
    pub async fn refresh_invite_code(
        &self,
        workspace_id: Uuid,
        caller_id: Uuid,
        expires_in_hours: Option<i64>,
    ) -> Result<InviteCodeResponse, WorkspaceError> {
        self.owned_workspace(workspace_id, caller_id).await?;
        let invite_expires_at = invite::expiry_from_hours(expires_in_hours, Utc::now())?;

        let invite_code = invite::with_fresh_code(|code| {
            let store = &self.workspaces;
            async move {
                store
                    .update_invite_code(workspace_id, &code, invite_expires_at)
                    .await?;
                Ok::<_, StoreError>(code)
            }
        })
        .await
        .map_err(not_found_as(WorkspaceError::NotFoundOrForbidden))?;

        tracing::info!(workspace_id = %workspace_id, "invite code refreshed");
        Ok(InviteCodeResponse {
            invite_code,
            invite_expires_at,
        })
    }

    /// Any member may create tasks and assign them to themselves; assigning
    /// someone else requires the owner role.
    pub async fn create_task(
        &self,
        workspace_id: Uuid,
        caller_id: Uuid,
        req: CreateWorkspaceTaskRequest,
    ) -> Result<Task, WorkspaceError> {
        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err(WorkspaceError::Validation("Title cannot be empty".into()));
        }

        let member = self
            .workspaces
            .find_member(workspace_id, caller_id)
            .await?
            .ok_or(WorkspaceError::NotFoundOrForbidden)?;

        if let Some(assignee_id) = req.assignee_id.filter(|id| *id != caller_id) {
            if member.role != MemberRole::Owner {
                return Err(WorkspaceError::Forbidden(
                    "Only the owner can assign tasks to others".into(),
                ));
            }
            if !self.workspaces.is_member(workspace_id, assignee_id).await? {
                return Err(WorkspaceError::AssigneeNotMember);
            }
        }

        let task = self
            .tasks
            .create(NewTask {
                title,
                description: req.description,
                status: TaskStatus::NotStarted,
                user_id: caller_id,
                workspace_id: Some(workspace_id),
                assignee_id: req.assignee_id,
            })
            .await?;
        Ok(task)
    }

    pub async fn list_tasks(
        &self,
        workspace_id: Uuid,
        caller_id: Uuid,
    ) -> Result<Vec<Task>, WorkspaceError> {
        if !self.workspaces.is_member(workspace_id, caller_id).await? {
            return Err(WorkspaceError::NotFoundOrForbidden);
        }
        Ok(self.tasks.list_by_workspace(workspace_id).await?)
    }

    /// Owner only, whoever created the task. `None` unassigns.
    pub async fn assign_task(
        &self,
        workspace_id: Uuid,
        task_id: Uuid,
        caller_id: Uuid,
        assignee_id: Option<Uuid>,
    ) -> Result<Task, WorkspaceError> {
        self.owned_workspace(workspace_id, caller_id).await?;

        let task = self
            .tasks
            .find_in_workspace(workspace_id, task_id)
            .await?
            .ok_or(WorkspaceError::TaskNotFound)?;

        if let Some(assignee_id) = assignee_id {
            if !self.workspaces.is_member(workspace_id, assignee_id).await? {
                return Err(WorkspaceError::AssigneeNotMember);
            }
        }

        let task = self
            .tasks
            .set_assignee(task.id, assignee_id)
            .await
            .map_err(not_found_as(WorkspaceError::TaskNotFound))?;

        tracing::info!(
            workspace_id = %workspace_id,
            task_id = %task_id,
            assignee_id = ?assignee_id,
            "task assigned"
        );
        Ok(task)
    }

    async fn owned_workspace(
        &self,
        workspace_id: Uuid,
        caller_id: Uuid,
    ) -> Result<Workspace, WorkspaceError> {
        self.workspaces
            .find_by_id(workspace_id)
            .await?
            .filter(|w| w.is_owned_by(caller_id))
            .ok_or(WorkspaceError::NotFoundOrForbidden)
    }

    async fn view(&self, workspace: Workspace) -> Result<WorkspaceResponse, WorkspaceError> {
        self.views(vec![workspace])
            .await?
            .pop()
            .ok_or(WorkspaceError::Store(StoreError::NotFound))
    }

    async fn views(
        &self,
        workspaces: Vec<Workspace>,
    ) -> Result<Vec<WorkspaceResponse>, WorkspaceError> {
        let ids: Vec<Uuid> = workspaces.iter().map(|w| w.id).collect();
        let mut members = self.workspaces.list_members(&ids).await?;

        let mut views = Vec::with_capacity(workspaces.len());
        for workspace in workspaces {
            let members = members.remove(&workspace.id).unwrap_or_default();
            let owner = match members.iter().find(|m| m.user_id == workspace.owner_id) {
                Some(m) => m.user(),
                None => self
                    .workspaces
                    .find_user(workspace.owner_id)
                    .await?
                    .ok_or(StoreError::NotFound)?,
            };
            views.push(workspace.into_response(owner, members));
        }
        Ok(views)
    }
}

fn not_found_as(replacement: WorkspaceError) -> impl FnOnce(StoreError) -> WorkspaceError {
    move |e| match e {
        StoreError::NotFound => replacement,
        other => other.into(),
    }
}
