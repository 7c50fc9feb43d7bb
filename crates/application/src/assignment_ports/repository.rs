use async_trait::async_trait;
use marketgate_core::{AppResult, UserId};
use marketgate_domain::{
    AccountStatus, AssignmentStatus, DocumentId, LegacyRole, Role, RoleAssignment,
    RoleAssignmentId, UserAccount, VerificationDocument,
};

/// Repository port for role assignments, their documents and owning users.
///
/// Reads outside a transaction observe committed state only.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Opens a unit of work. Dropping it without commit rolls back.
    async fn begin(&self) -> AppResult<Box<dyn AssignmentTransaction>>;

    /// Finds one assignment.
    async fn find_assignment(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Option<RoleAssignment>>;

    /// Lists assignments held by one user.
    async fn list_assignments_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>>;

    /// Lists assignments in one status, oldest first.
    async fn list_assignments_by_status(
        &self,
        status: AssignmentStatus,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Finds one document.
    async fn find_document(&self, document_id: DocumentId)
    -> AppResult<Option<VerificationDocument>>;

    /// Lists documents of one assignment.
    async fn list_documents(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Vec<VerificationDocument>>;

    /// Finds one user account.
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>>;
}

/// One unit of work over the role workflow tables.
///
/// Locks are exclusive and held until commit or drop. Callers lock the user
/// row before any assignment row; re-locking a held row is a no-op.
/// Reads inside the transaction observe its own writes.
#[async_trait]
pub trait AssignmentTransaction: Send {
    /// Locks and returns a user row.
    async fn lock_user(&mut self, user_id: UserId) -> AppResult<UserAccount>;

    /// Locks the owning user row, then the assignment row.
    async fn lock_assignment(&mut self, assignment_id: RoleAssignmentId) -> AppResult<RoleAssignment>;

    /// Inserts a freshly registered user.
    async fn insert_user(&mut self, user: &UserAccount) -> AppResult<()>;

    /// Writes the account status and legacy role mirror of a locked user.
    async fn update_user_access(
        &mut self,
        user_id: UserId,
        status: AccountStatus,
        legacy_role: Option<LegacyRole>,
    ) -> AppResult<()>;

    /// Finds the assignment for a `(user, role)` pair.
    async fn find_assignment_for_role(
        &mut self,
        user_id: UserId,
        role: Role,
    ) -> AppResult<Option<RoleAssignment>>;

    /// Lists all assignments of a user.
    async fn list_assignments_for_user(&mut self, user_id: UserId)
    -> AppResult<Vec<RoleAssignment>>;

    /// Inserts an assignment. Fails when the `(user, role)` pair exists.
    async fn insert_assignment(&mut self, assignment: &RoleAssignment) -> AppResult<()>;

    /// Overwrites a locked assignment.
    async fn update_assignment(&mut self, assignment: &RoleAssignment) -> AppResult<()>;

    /// Lists documents of an assignment.
    async fn list_documents(
        &mut self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Vec<VerificationDocument>>;

    /// Inserts a document.
    async fn insert_document(&mut self, document: &VerificationDocument) -> AppResult<()>;

    /// Overwrites a document.
    async fn update_document(&mut self, document: &VerificationDocument) -> AppResult<()>;

    /// Makes every write visible and releases all locks.
    async fn commit(&mut self) -> AppResult<()>;
}
