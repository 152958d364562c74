use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::task::{NewTask, Task};
use crate::models::user::UserSummary;
use crate::models::workspace::{MemberDetail, MemberRole, NewWorkspace, Workspace, WorkspaceMember};

use super::store::{StoreError, TaskStore, WorkspaceStore};

#[derive(Clone)]
pub struct PgWorkspaceStore {
    pool: PgPool,
}

impl PgWorkspaceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceStore for PgWorkspaceStore {
    async fn create_with_owner(&self, new: NewWorkspace) -> Result<Workspace, StoreError> {
        let mut tx = self.pool.begin().await?;

        let workspace = sqlx::query_as::<_, Workspace>(
            "INSERT INTO workspaces (name, description, owner_id, invite_code, invite_expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.owner_id)
        .bind(&new.invite_code)
        .bind(new.invite_expires_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role) VALUES ($1, $2, $3)",
        )
        .bind(workspace.id)
        .bind(new.owner_id)
        .bind(MemberRole::Owner)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(workspace)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Workspace>, StoreError> {
        let workspace = sqlx::query_as::<_, Workspace>(
            "SELECT * FROM workspaces WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(workspace)
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Workspace>, StoreError> {
        let workspaces = sqlx::query_as::<_, Workspace>(
            "SELECT * FROM workspaces
             WHERE owner_id = $1 AND deleted_at IS NULL
             ORDER BY created_at",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(workspaces)
    }

    async fn find_by_member(&self, user_id: Uuid) -> Result<Vec<Workspace>, StoreError> {
        let workspaces = sqlx::query_as::<_, Workspace>(
            "SELECT w.* FROM workspaces w
             JOIN workspace_members m ON m.workspace_id = w.id AND m.deleted_at IS NULL
             WHERE m.user_id = $1 AND w.deleted_at IS NULL
             ORDER BY w.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(workspaces)
    }

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Workspace>, StoreError> {
        let workspace = sqlx::query_as::<_, Workspace>(
            "SELECT * FROM workspaces WHERE invite_code = $1 AND deleted_at IS NULL",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(workspace)
    }

    async fn update_details(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<Workspace, StoreError> {
        sqlx::query_as::<_, Workspace>(
            "UPDATE workspaces SET name = $1, description = $2, updated_at = NOW()
             WHERE id = $3 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(name)
        .bind(description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn soft_delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE workspaces SET deleted_at = NOW()
             WHERE id = $1 AND owner_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<WorkspaceMember, StoreError> {
        let member = sqlx::query_as::<_, WorkspaceMember>(
            "INSERT INTO workspace_members (workspace_id, user_id, role)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    async fn find_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceMember>, StoreError> {
        let member = sqlx::query_as::<_, WorkspaceMember>(
            "SELECT m.* FROM workspace_members m
             JOIN workspaces w ON w.id = m.workspace_id AND w.deleted_at IS NULL
             WHERE m.workspace_id = $1 AND m.user_id = $2 AND m.deleted_at IS NULL",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn is_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM workspace_members m
                JOIN workspaces w ON w.id = m.workspace_id AND w.deleted_at IS NULL
                WHERE m.workspace_id = $1 AND m.user_id = $2 AND m.deleted_at IS NULL
             )",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_members(
        &self,
        workspace_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<MemberDetail>>, StoreError> {
        if workspace_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, MemberDetail>(
            "SELECT m.id, m.workspace_id, m.user_id, m.role, m.joined_at, u.username, u.email
             FROM workspace_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.workspace_id = ANY($1) AND m.deleted_at IS NULL
             ORDER BY m.joined_at",
        )
        .bind(workspace_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut map: HashMap<Uuid, Vec<MemberDetail>> = HashMap::new();
        for row in rows {
            map.entry(row.workspace_id).or_default().push(row);
        }
        Ok(map)
    }

    async fn remove_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE workspace_members SET deleted_at = NOW()
             WHERE workspace_id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(workspace_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_invite_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE workspaces SET invite_code = $1, invite_expires_at = $2, updated_at = NOW()
             WHERE id = $3 AND deleted_at IS NULL",
        )
        .bind(code)
        .bind(expires_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserSummary>, StoreError> {
        let user = sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, email FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (title, description, status, user_id, workspace_id, assignee_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.status)
        .bind(new.user_id)
        .bind(new.workspace_id)
        .bind(new.assignee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(task)
    }

    async fn find_in_workspace(
        &self,
        workspace_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<Task>, StoreError> {
        let task = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE id = $1 AND workspace_id = $2 AND deleted_at IS NULL",
        )
        .bind(task_id)
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    async fn list_by_workspace(&self, workspace_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks
             WHERE workspace_id = $1 AND deleted_at IS NULL
             ORDER BY sort_order, created_at",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn set_assignee(
        &self,
        task_id: Uuid,
        assignee_id: Option<Uuid>,
    ) -> Result<Task, StoreError> {
        sqlx::query_as::<_, Task>(
            "UPDATE tasks SET assignee_id = $1, updated_at = NOW()
             WHERE id = $2 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(assignee_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }
}
