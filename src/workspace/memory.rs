//! In-memory store used by service and route tests.
//!
//! Mirrors the Postgres schema's rules: unique invite codes across all
//! workspaces, one active membership per (workspace, user), soft deletes
//! filtered on every read.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::task::{NewTask, Task};
use crate::models::user::UserSummary;
use crate::models::workspace::{MemberDetail, MemberRole, NewWorkspace, Workspace, WorkspaceMember};

use super::store::{StoreError, TaskStore, WorkspaceStore};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, UserSummary>,
    workspaces: HashMap<Uuid, Workspace>,
    members: Vec<WorkspaceMember>,
    tasks: HashMap<Uuid, Task>,
    /// Number of upcoming invite-code writes to reject as duplicates.
    forced_invite_collisions: usize,
    /// Number of upcoming `is_member` calls that report `false` regardless.
    missed_membership_checks: usize,
}

impl Tables {
    fn live_workspace(&self, id: Uuid) -> Option<&Workspace> {
        self.workspaces.get(&id).filter(|w| w.deleted_at.is_none())
    }

    fn active_member(&self, workspace_id: Uuid, user_id: Uuid) -> Option<&WorkspaceMember> {
        self.live_workspace(workspace_id)?;
        self.members.iter().find(|m| {
            m.workspace_id == workspace_id && m.user_id == user_id && m.deleted_at.is_none()
        })
    }

    fn claim_invite_code(
        &mut self,
        code: &str,
        workspace_id: Option<Uuid>,
    ) -> Result<(), StoreError> {
        if self.forced_invite_collisions > 0 {
            self.forced_invite_collisions -= 1;
            return Err(StoreError::DuplicateInviteCode);
        }
        let taken = self
            .workspaces
            .values()
            .any(|w| w.invite_code == code && Some(w.id) != workspace_id);
        if taken {
            return Err(StoreError::DuplicateInviteCode);
        }
        Ok(())
    }

    fn insert_member(
        &mut self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<WorkspaceMember, StoreError> {
        let duplicate = self.members.iter().any(|m| {
            m.workspace_id == workspace_id && m.user_id == user_id && m.deleted_at.is_none()
        });
        if duplicate {
            return Err(StoreError::DuplicateMember);
        }
        let member = WorkspaceMember {
            id: Uuid::new_v4(),
            workspace_id,
            user_id,
            role,
            joined_at: Utc::now(),
            deleted_at: None,
        };
        self.members.push(member.clone());
        Ok(member)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, username: &str) -> Uuid {
        let user = UserSummary {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
        };
        let id = user.id;
        self.tables.write().await.users.insert(id, user);
        id
    }

    /// Make the next `n` invite-code writes fail as if the code were taken.
    pub async fn force_invite_collisions(&self, n: usize) {
        self.tables.write().await.forced_invite_collisions = n;
    }

    /// Make the next `n` membership checks miss, as if a concurrent join
    /// had not committed yet.
    pub async fn miss_membership_checks(&self, n: usize) {
        self.tables.write().await.missed_membership_checks = n;
    }

    pub async fn set_invite_expiry(&self, workspace_id: Uuid, expires_at: Option<DateTime<Utc>>) {
        if let Some(w) = self.tables.write().await.workspaces.get_mut(&workspace_id) {
            w.invite_expires_at = expires_at;
        }
    }

    /// Every membership row for a workspace, soft-deleted ones included.
    pub async fn member_rows(&self, workspace_id: Uuid) -> Vec<WorkspaceMember> {
        self.tables
            .read()
            .await
            .members
            .iter()
            .filter(|m| m.workspace_id == workspace_id)
            .cloned()
            .collect()
    }

    /// The raw workspace row, even when soft-deleted.
    pub async fn workspace_row(&self, workspace_id: Uuid) -> Option<Workspace> {
        self.tables.read().await.workspaces.get(&workspace_id).cloned()
    }
}

#[async_trait]
impl WorkspaceStore for MemoryStore {
    async fn create_with_owner(&self, new: NewWorkspace) -> Result<Workspace, StoreError> {
        let mut tables = self.tables.write().await;
        tables.claim_invite_code(&new.invite_code, None)?;

        // Owner row first: if it fails, no workspace row is left behind.
        let id = Uuid::new_v4();
        tables.insert_member(id, new.owner_id, MemberRole::Owner)?;

        let now = Utc::now();
        let workspace = Workspace {
            id,
            name: new.name,
            description: new.description,
            owner_id: new.owner_id,
            invite_code: new.invite_code,
            invite_expires_at: new.invite_expires_at,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.workspaces.insert(workspace.id, workspace.clone());
        Ok(workspace)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Workspace>, StoreError> {
        Ok(self.tables.read().await.live_workspace(id).cloned())
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Workspace>, StoreError> {
        let tables = self.tables.read().await;
        let mut found: Vec<Workspace> = tables
            .workspaces
            .values()
            .filter(|w| w.owner_id == owner_id && w.deleted_at.is_none())
            .cloned()
            .collect();
        found.sort_by_key(|w| w.created_at);
        Ok(found)
    }

    async fn find_by_member(&self, user_id: Uuid) -> Result<Vec<Workspace>, StoreError> {
        let tables = self.tables.read().await;
        let mut found: Vec<Workspace> = tables
            .members
            .iter()
            .filter(|m| m.user_id == user_id && m.deleted_at.is_none())
            .filter_map(|m| tables.live_workspace(m.workspace_id))
            .cloned()
            .collect();
        found.sort_by_key(|w| w.created_at);
        Ok(found)
    }

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Workspace>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .workspaces
            .values()
            .find(|w| w.invite_code == code && w.deleted_at.is_none())
            .cloned())
    }

    async fn update_details(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<Workspace, StoreError> {
        let mut tables = self.tables.write().await;
        let workspace = tables
            .workspaces
            .get_mut(&id)
            .filter(|w| w.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        workspace.name = name.to_string();
        workspace.description = description.to_string();
        workspace.updated_at = Utc::now();
        Ok(workspace.clone())
    }

    async fn soft_delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let workspace = tables
            .workspaces
            .get_mut(&id)
            .filter(|w| w.owner_id == owner_id && w.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        workspace.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<WorkspaceMember, StoreError> {
        self.tables
            .write()
            .await
            .insert_member(workspace_id, user_id, role)
    }

    async fn find_member(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceMember>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .active_member(workspace_id, user_id)
            .cloned())
    }

    async fn is_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.missed_membership_checks > 0 {
            tables.missed_membership_checks -= 1;
            return Ok(false);
        }
        Ok(tables.active_member(workspace_id, user_id).is_some())
    }

    async fn list_members(
        &self,
        workspace_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<MemberDetail>>, StoreError> {
        let tables = self.tables.read().await;
        let mut map: HashMap<Uuid, Vec<MemberDetail>> = HashMap::new();
        for m in tables
            .members
            .iter()
            .filter(|m| workspace_ids.contains(&m.workspace_id) && m.deleted_at.is_none())
        {
            let Some(user) = tables.users.get(&m.user_id) else {
                continue;
            };
            map.entry(m.workspace_id).or_default().push(MemberDetail {
                id: m.id,
                workspace_id: m.workspace_id,
                user_id: m.user_id,
                role: m.role,
                joined_at: m.joined_at,
                username: user.username.clone(),
                email: user.email.clone(),
            });
        }
        Ok(map)
    }

    async fn remove_member(&self, workspace_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let member = tables
            .members
            .iter_mut()
            .find(|m| {
                m.workspace_id == workspace_id && m.user_id == user_id && m.deleted_at.is_none()
            })
            .ok_or(StoreError::NotFound)?;
        member.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn update_invite_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.live_workspace(id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.claim_invite_code(code, Some(id))?;
        if let Some(workspace) = tables.workspaces.get_mut(&id) {
            workspace.invite_code = code.to_string();
            workspace.invite_expires_at = expires_at;
            workspace.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserSummary>, StoreError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            status: new.status,
            sort_order: 0,
            user_id: new.user_id,
            workspace_id: new.workspace_id,
            assignee_id: new.assignee_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.tables.write().await.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_in_workspace(
        &self,
        workspace_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<Task>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .tasks
            .get(&task_id)
            .filter(|t| t.workspace_id == Some(workspace_id) && t.deleted_at.is_none())
            .cloned())
    }

    async fn list_by_workspace(&self, workspace_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| t.workspace_id == Some(workspace_id) && t.deleted_at.is_none())
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.sort_order, t.created_at));
        Ok(tasks)
    }

    async fn set_assignee(
        &self,
        task_id: Uuid,
        assignee_id: Option<Uuid>,
    ) -> Result<Task, StoreError> {
        let mut tables = self.tables.write().await;
        let task = tables
            .tasks
            .get_mut(&task_id)
            .filter(|t| t.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        task.assignee_id = assignee_id;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_workspace(owner_id: Uuid, code: &str) -> NewWorkspace {
        NewWorkspace {
            name: "Sprint".into(),
            description: String::new(),
            owner_id,
            invite_code: code.into(),
            invite_expires_at: None,
        }
    }

    async fn sprint(store: &MemoryStore, owner_id: Uuid) -> Workspace {
        store
            .create_with_owner(new_workspace(owner_id, "AAAA1111"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn second_active_membership_is_a_duplicate() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let ws = sprint(&store, alice).await;

        store
            .add_member(ws.id, bob, MemberRole::Member)
            .await
            .unwrap();
        let again = store.add_member(ws.id, bob, MemberRole::Member).await;
        assert!(matches!(again, Err(StoreError::DuplicateMember)));

        store.remove_member(ws.id, bob).await.unwrap();
        let rejoined = store.add_member(ws.id, bob, MemberRole::Member).await;
        assert!(rejoined.is_ok());
    }

    #[tokio::test]
    async fn taken_invite_code_creates_nothing() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        sprint(&store, alice).await;

        let clash = store
            .create_with_owner(new_workspace(alice, "AAAA1111"))
            .await;
        assert!(matches!(clash, Err(StoreError::DuplicateInviteCode)));
        assert_eq!(store.find_by_owner(alice).await.unwrap().len(), 1);
        assert_eq!(store.tables.read().await.members.len(), 1);
    }

    #[tokio::test]
    async fn created_workspace_has_its_owner_row() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let ws = sprint(&store, alice).await;

        let owner = store.find_member(ws.id, alice).await.unwrap().unwrap();
        assert_eq!(owner.role, MemberRole::Owner);
        assert_eq!(owner.workspace_id, ws.id);
    }
}
