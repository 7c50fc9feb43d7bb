use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketgate_application::{
    AssignmentTransaction, IdentityDocumentFallback, MarketDirectory, RoleAssignmentRepository,
    SessionStore,
};
use marketgate_core::{AppError, AppResult, UserId};
use marketgate_domain::{
    AssignmentStatus, DocumentId, DocumentStatus, DocumentStatusMap, DocumentType, MarketId,
    RoleAssignment, RoleAssignmentId, UserAccount, VerificationDocument,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

mod transaction;


use transaction::InMemoryAssignmentTransaction;

/// Committed rows of the in-memory store.
#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<UserId, UserAccount>,
    assignments: HashMap<RoleAssignmentId, RoleAssignment>,
    documents: HashMap<DocumentId, VerificationDocument>,
    identity_documents: HashMap<UserId, Vec<IdentityDocumentRow>>,
    markets: HashMap<MarketId, Option<UserId>>,
    live_sessions: HashMap<UserId, usize>,
}

#[derive(Debug, Clone)]
struct IdentityDocumentRow {
    doc_type: DocumentType,
    status: DocumentStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LockKey {
    User(UserId),
    Assignment(RoleAssignmentId),
}

/// Row lock table keyed by user or assignment.
#[derive(Debug, Default)]
struct LockTable {
    rows: StdMutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl LockTable {
    async fn acquire(&self, key: LockKey) -> AppResult<OwnedMutexGuard<()>> {
        let row = {
            let mut rows = self
                .rows
                .lock()
                .map_err(|error| AppError::Internal(format!("lock table poisoned: {error}")))?;
            rows.entry(key).or_default().clone()
        };

        Ok(row.lock_owned().await)
    }
}

/// In-memory role workflow store with row-level locking.
///
/// Also serves sessions, identity documents and market scope so a single
/// instance can back every port of the lifecycle service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleAssignmentStore {
    state: Arc<RwLock<StoreState>>,
    locks: Arc<LockTable>,
}

impl InMemoryRoleAssignmentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a user account as committed state.
    pub async fn seed_user(&self, user: UserAccount) {
        self.state.write().await.users.insert(user.id, user);
    }

    /// Stores an assignment as committed state.
    pub async fn seed_assignment(&self, assignment: RoleAssignment) {
        self.state
            .write()
            .await
            .assignments
            .insert(assignment.id, assignment);
    }

    /// Stores a verification document as committed state.
    pub async fn seed_document(&self, document: VerificationDocument) {
        self.state
            .write()
            .await
            .documents
            .insert(document.id, document);
    }

    /// Registers a market and its manager.
    pub async fn seed_market(&self, market_id: MarketId, manager_id: Option<UserId>) {
        self.state.write().await.markets.insert(market_id, manager_id);
    }

    /// Records a user-level identity document.
    pub async fn seed_identity_document(
        &self,
        user_id: UserId,
        doc_type: DocumentType,
        status: DocumentStatus,
    ) {
        self.state
            .write()
            .await
            .identity_documents
            .entry(user_id)
            .or_default()
            .push(IdentityDocumentRow {
                doc_type,
                status,
                created_at: Utc::now(),
            });
    }

    /// Returns the number of live sessions of a user.
    pub async fn live_sessions(&self, user_id: UserId) -> usize {
        self.state
            .read()
            .await
            .live_sessions
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoleAssignmentRepository for InMemoryRoleAssignmentStore {
    async fn begin(&self) -> AppResult<Box<dyn AssignmentTransaction>> {
        Ok(Box::new(InMemoryAssignmentTransaction::new(
            self.state.clone(),
            self.locks.clone(),
        )))
    }

    async fn find_assignment(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .get(&assignment_id)
            .cloned())
    }

    async fn list_assignments_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;
        let mut assignments: Vec<RoleAssignment> = state
            .assignments
            .values()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|assignment| assignment.created_at);

        Ok(assignments)
    }

    async fn list_assignments_by_status(
        &self,
        status: AssignmentStatus,
    ) -> AppResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;
        let mut assignments: Vec<RoleAssignment> = state
            .assignments
            .values()
            .filter(|assignment| assignment.status == status)
            .cloned()
            .collect();
        assignments.sort_by_key(|assignment| assignment.created_at);

        Ok(assignments)
    }

    async fn find_document(
        &self,
        document_id: DocumentId,
    ) -> AppResult<Option<VerificationDocument>> {
        Ok(self.state.read().await.documents.get(&document_id).cloned())
    }

    async fn list_documents(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Vec<VerificationDocument>> {
        let state = self.state.read().await;
        let mut documents: Vec<VerificationDocument> = state
            .documents
            .values()
            .filter(|document| document.role_assignment_id == assignment_id)
            .cloned()
            .collect();
        documents.sort_by_key(|document| document.created_at);

        Ok(documents)
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl SessionStore for InMemoryRoleAssignmentStore {
    async fn register_session(&self, _session_id: &str, user_id: UserId) -> AppResult<()> {
        *self
            .state
            .write()
            .await
            .live_sessions
            .entry(user_id)
            .or_default() += 1;
        Ok(())
    }

    async fn invalidate_all(&self, user_id: UserId) -> AppResult<()> {
        self.state.write().await.live_sessions.remove(&user_id);
        Ok(())
    }

    async fn bump_epoch(&self, user_id: UserId) -> AppResult<i64> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;
        user.session_epoch += 1;

        Ok(user.session_epoch)
    }

    async fn current_epoch(&self, user_id: UserId) -> AppResult<i64> {
        self.state
            .read()
            .await
            .users
            .get(&user_id)
            .map(|user| user.session_epoch)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))
    }
}

#[async_trait]
impl IdentityDocumentFallback for InMemoryRoleAssignmentStore {
    async fn latest_by_type(&self, user_id: UserId) -> AppResult<DocumentStatusMap> {
        let state = self.state.read().await;
        let mut latest: HashMap<DocumentType, &IdentityDocumentRow> = HashMap::new();
        for row in state.identity_documents.get(&user_id).into_iter().flatten() {
            latest
                .entry(row.doc_type)
                .and_modify(|current| {
                    if row.created_at >= current.created_at {
                        *current = row;
                    }
                })
                .or_insert(row);
        }

        Ok(latest
            .into_iter()
            .map(|(doc_type, row)| (doc_type, row.status))
            .collect())
    }
}

#[async_trait]
impl MarketDirectory for InMemoryRoleAssignmentStore {
    async fn is_market_manager(&self, user_id: UserId, market_id: MarketId) -> AppResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .markets
            .get(&market_id)
            .is_some_and(|manager| *manager == Some(user_id)))
    }

    async fn markets_managed_by(&self, user_id: UserId) -> AppResult<Vec<MarketId>> {
        let state = self.state.read().await;
        let mut markets: Vec<MarketId> = state
            .markets
            .iter()
            .filter_map(|(market_id, manager)| (*manager == Some(user_id)).then_some(*market_id))
            .collect();
        markets.sort_by_key(MarketId::as_uuid);

        Ok(markets)
    }
}
