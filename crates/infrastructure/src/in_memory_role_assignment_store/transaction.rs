use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use marketgate_application::AssignmentTransaction;
use marketgate_core::{AppError, AppResult, UserId};
use marketgate_domain::{
    AccountStatus, DocumentId, LegacyRole, Role, RoleAssignment, RoleAssignmentId, UserAccount,
    VerificationDocument,
};
use tokio::sync::{OwnedMutexGuard, RwLock};

use super::{LockKey, LockTable, StoreState};

/// Uncommitted writes of one transaction.
///
/// Access changes are kept apart from the user row so that a concurrent
/// epoch bump is never overwritten on commit.
#[derive(Debug, Default)]
struct PendingWrites {
    new_users: HashMap<UserId, UserAccount>,
    user_access: HashMap<UserId, (AccountStatus, Option<LegacyRole>)>,
    assignments: HashMap<RoleAssignmentId, RoleAssignment>,
    documents: HashMap<DocumentId, VerificationDocument>,
}

pub(super) struct InMemoryAssignmentTransaction {
    state: Arc<RwLock<StoreState>>,
    locks: Arc<LockTable>,
    held: HashMap<LockKey, OwnedMutexGuard<()>>,
    pending: PendingWrites,
}

impl InMemoryAssignmentTransaction {
    pub(super) fn new(state: Arc<RwLock<StoreState>>, locks: Arc<LockTable>) -> Self {
        Self {
            state,
            locks,
            held: HashMap::new(),
            pending: PendingWrites::default(),
        }
    }

    async fn acquire(&mut self, key: LockKey) -> AppResult<()> {
        if !self.held.contains_key(&key) {
            let guard = self.locks.acquire(key).await?;
            self.held.insert(key, guard);
        }

        Ok(())
    }

    async fn read_user(&self, user_id: UserId) -> Option<UserAccount> {
        let mut user = match self.pending.new_users.get(&user_id) {
            Some(user) => user.clone(),
            None => self.state.read().await.users.get(&user_id).cloned()?,
        };
        if let Some((status, legacy_role)) = self.pending.user_access.get(&user_id) {
            user.status = *status;
            user.legacy_role = *legacy_role;
        }

        Some(user)
    }

    async fn read_assignment(&self, assignment_id: RoleAssignmentId) -> Option<RoleAssignment> {
        match self.pending.assignments.get(&assignment_id) {
            Some(assignment) => Some(assignment.clone()),
            None => self
                .state
                .read()
                .await
                .assignments
                .get(&assignment_id)
                .cloned(),
        }
    }

    async fn merged_assignments(&self, user_id: UserId) -> Vec<RoleAssignment> {
        let state = self.state.read().await;
        let mut merged: HashMap<RoleAssignmentId, RoleAssignment> = state
            .assignments
            .values()
            .filter(|assignment| assignment.user_id == user_id)
            .map(|assignment| (assignment.id, assignment.clone()))
            .collect();
        for assignment in self.pending.assignments.values() {
            if assignment.user_id == user_id {
                merged.insert(assignment.id, assignment.clone());
            }
        }

        let mut assignments: Vec<RoleAssignment> = merged.into_values().collect();
        assignments.sort_by_key(|assignment| assignment.created_at);
        assignments
    }

    fn require_user_lock(&self, user_id: UserId) -> AppResult<()> {
        if self.held.contains_key(&LockKey::User(user_id)) {
            return Ok(());
        }

        Err(AppError::Internal(format!(
            "user '{user_id}' must be locked before it is written"
        )))
    }
}

#[async_trait]
impl AssignmentTransaction for InMemoryAssignmentTransaction {
    async fn lock_user(&mut self, user_id: UserId) -> AppResult<UserAccount> {
        self.acquire(LockKey::User(user_id)).await?;

        self.read_user(user_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))
    }

    async fn lock_assignment(
        &mut self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<RoleAssignment> {
        let owner = self
            .read_assignment(assignment_id)
            .await
            .map(|assignment| assignment.user_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("role assignment '{assignment_id}' not found"))
            })?;

        self.acquire(LockKey::User(owner)).await?;
        self.acquire(LockKey::Assignment(assignment_id)).await?;

        self.read_assignment(assignment_id).await.ok_or_else(|| {
            AppError::NotFound(format!("role assignment '{assignment_id}' not found"))
        })
    }

    async fn insert_user(&mut self, user: &UserAccount) -> AppResult<()> {
        if self.read_user(user.id).await.is_some() {
            return Err(AppError::Persistence(format!(
                "user '{}' already exists",
                user.id
            )));
        }

        self.acquire(LockKey::User(user.id)).await?;
        self.pending.new_users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user_access(
        &mut self,
        user_id: UserId,
        status: AccountStatus,
        legacy_role: Option<LegacyRole>,
    ) -> AppResult<()> {
        self.require_user_lock(user_id)?;
        self.pending
            .user_access
            .insert(user_id, (status, legacy_role));
        Ok(())
    }

    async fn find_assignment_for_role(
        &mut self,
        user_id: UserId,
        role: Role,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self
            .merged_assignments(user_id)
            .await
            .into_iter()
            .find(|assignment| assignment.role == role))
    }

    async fn list_assignments_for_user(
        &mut self,
        user_id: UserId,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self.merged_assignments(user_id).await)
    }

    async fn insert_assignment(&mut self, assignment: &RoleAssignment) -> AppResult<()> {
        self.require_user_lock(assignment.user_id)?;
        if self
            .find_assignment_for_role(assignment.user_id, assignment.role)
            .await?
            .is_some()
        {
            return Err(AppError::Persistence(format!(
                "user '{}' already has a '{}' assignment",
                assignment.user_id, assignment.role
            )));
        }

        self.acquire(LockKey::Assignment(assignment.id)).await?;
        self.pending
            .assignments
            .insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn update_assignment(&mut self, assignment: &RoleAssignment) -> AppResult<()> {
        self.require_user_lock(assignment.user_id)?;
        self.pending
            .assignments
            .insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn list_documents(
        &mut self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Vec<VerificationDocument>> {
        let state = self.state.read().await;
        let mut merged: HashMap<DocumentId, VerificationDocument> = state
            .documents
            .values()
            .filter(|document| document.role_assignment_id == assignment_id)
            .map(|document| (document.id, document.clone()))
            .collect();
        for document in self.pending.documents.values() {
            if document.role_assignment_id == assignment_id {
                merged.insert(document.id, document.clone());
            }
        }

        let mut documents: Vec<VerificationDocument> = merged.into_values().collect();
        documents.sort_by_key(|document| document.created_at);
        Ok(documents)
    }

    async fn insert_document(&mut self, document: &VerificationDocument) -> AppResult<()> {
        self.pending.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn update_document(&mut self, document: &VerificationDocument) -> AppResult<()> {
        self.pending.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        let pending = std::mem::take(&mut self.pending);
        {
            let mut state = self.state.write().await;
            for (user_id, user) in pending.new_users {
                state.users.insert(user_id, user);
            }
            for (user_id, (status, legacy_role)) in pending.user_access {
                let user = state.users.get_mut(&user_id).ok_or_else(|| {
                    AppError::Persistence(format!("user '{user_id}' vanished before commit"))
                })?;
                user.status = status;
                user.legacy_role = legacy_role;
            }
            state.assignments.extend(pending.assignments);
            state.documents.extend(pending.documents);
        }

        self.held.clear();
        Ok(())
    }
}
