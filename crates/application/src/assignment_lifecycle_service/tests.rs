use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use marketgate_core::{ActorIdentity, AppError, AppResult, UserId};
use marketgate_domain::{
    AccountStatus, AssignmentStatus, AuditAction, DocumentId, DocumentStatus, DocumentStatusMap,
    DocumentType, DocumentUpload, FileReference, LegacyRole, MarketId, Role, RoleAssignment,
    RoleAssignmentId, RoleRequirementPolicy, UploadContext, UserAccount, VendorEvidence,
    VerificationDocument,
};

use crate::assignment_ports::{
    AssignmentTransaction, AuditEvent, AuditSink, DocumentBlobStore, IdentityDocumentFallback,
    MarketDirectory, Notification, NotificationGateway, RoleAssignmentRepository, SessionStore,
};

use super::{
    AssignmentInitiator, AssignmentLifecyclePorts, AssignmentLifecycleService, AssignmentSubject,
    CreateAssignmentInput, DocumentUploadInput, ResubmissionInput,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    users: HashMap<UserId, UserAccount>,
    assignments: HashMap<RoleAssignmentId, RoleAssignment>,
    documents: HashMap<DocumentId, VerificationDocument>,
}

#[derive(Default)]
struct FakeRepository {
    state: Arc<Mutex<StoreState>>,
    gate: Arc<Mutex<()>>,
}

struct FakeTransaction {
    gate: Option<OwnedMutexGuard<()>>,
    state: Arc<Mutex<StoreState>>,
    working: StoreState,
}

#[async_trait]
impl RoleAssignmentRepository for FakeRepository {
    async fn begin(&self) -> AppResult<Box<dyn AssignmentTransaction>> {
        let gate = self.gate.clone().lock_owned().await;
        let working = self.state.lock().await.clone();
        Ok(Box::new(FakeTransaction {
            gate: Some(gate),
            state: self.state.clone(),
            working,
        }))
    }

    async fn find_assignment(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self.state.lock().await.assignments.get(&assignment_id).cloned())
    }

    async fn list_assignments_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .state
            .lock()
            .await
            .assignments
            .values()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_assignments_by_status(
        &self,
        status: AssignmentStatus,
    ) -> AppResult<Vec<RoleAssignment>> {
        let mut assignments: Vec<RoleAssignment> = self
            .state
            .lock()
            .await
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
        Ok(self.state.lock().await.documents.get(&document_id).cloned())
    }

    async fn list_documents(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Vec<VerificationDocument>> {
        Ok(self
            .state
            .lock()
            .await
            .documents
            .values()
            .filter(|document| document.role_assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl AssignmentTransaction for FakeTransaction {
    async fn lock_user(&mut self, user_id: UserId) -> AppResult<UserAccount> {
        self.working
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))
    }

    async fn lock_assignment(
        &mut self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<RoleAssignment> {
        self.working
            .assignments
            .get(&assignment_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("assignment '{assignment_id}' not found")))
    }

    async fn insert_user(&mut self, user: &UserAccount) -> AppResult<()> {
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user_access(
        &mut self,
        user_id: UserId,
        status: AccountStatus,
        legacy_role: Option<LegacyRole>,
    ) -> AppResult<()> {
        let user = self
            .working
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;
        user.status = status;
        user.legacy_role = legacy_role;
        Ok(())
    }

    async fn find_assignment_for_role(
        &mut self,
        user_id: UserId,
        role: Role,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self
            .working
            .assignments
            .values()
            .find(|assignment| assignment.user_id == user_id && assignment.role == role)
            .cloned())
    }

    async fn list_assignments_for_user(
        &mut self,
        user_id: UserId,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .working
            .assignments
            .values()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_assignment(&mut self, assignment: &RoleAssignment) -> AppResult<()> {
        let duplicate = self.working.assignments.values().any(|existing| {
            existing.user_id == assignment.user_id && existing.role == assignment.role
        });
        if duplicate {
            return Err(AppError::Persistence(
                "duplicate role assignment".to_owned(),
            ));
        }
        self.working
            .assignments
            .insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn update_assignment(&mut self, assignment: &RoleAssignment) -> AppResult<()> {
        self.working
            .assignments
            .insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn list_documents(
        &mut self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Vec<VerificationDocument>> {
        Ok(self
            .working
            .documents
            .values()
            .filter(|document| document.role_assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn insert_document(&mut self, document: &VerificationDocument) -> AppResult<()> {
        self.working.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn update_document(&mut self, document: &VerificationDocument) -> AppResult<()> {
        self.working.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        *self.state.lock().await = self.working.clone();
        self.gate = None;
        Ok(())
    }
}

#[derive(Default)]
struct FakeBlobStore {
    stored: Mutex<Vec<FileReference>>,
}

#[async_trait]
impl DocumentBlobStore for FakeBlobStore {
    async fn put(
        &self,
        assignment_id: RoleAssignmentId,
        upload: &DocumentUpload,
    ) -> AppResult<FileReference> {
        let mut stored = self.stored.lock().await;
        let reference = FileReference::new(format!(
            "{assignment_id}/{}-{}.{}",
            upload.doc_type().as_str(),
            stored.len(),
            upload.mime_type().extension()
        ))?;
        stored.push(reference.clone());
        Ok(reference)
    }
}

#[derive(Default)]
struct FakeIdentityDocuments {
    statuses: Mutex<HashMap<UserId, DocumentStatusMap>>,
}

#[async_trait]
impl IdentityDocumentFallback for FakeIdentityDocuments {
    async fn latest_by_type(&self, user_id: UserId) -> AppResult<DocumentStatusMap> {
        Ok(self
            .statuses
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct FakeMarkets {
    managers: Mutex<Vec<(UserId, MarketId)>>,
}

#[async_trait]
impl MarketDirectory for FakeMarkets {
    async fn is_market_manager(&self, user_id: UserId, market_id: MarketId) -> AppResult<bool> {
        Ok(self
            .managers
            .lock()
            .await
            .contains(&(user_id, market_id)))
    }

    async fn markets_managed_by(&self, user_id: UserId) -> AppResult<Vec<MarketId>> {
        Ok(self
            .managers
            .lock()
            .await
            .iter()
            .filter(|(manager, _)| *manager == user_id)
            .map(|(_, market_id)| *market_id)
            .collect())
    }
}

#[derive(Default)]
struct FakeSessionStore {
    invalidations: Mutex<Vec<UserId>>,
    bumps: Mutex<Vec<UserId>>,
    failing: Mutex<bool>,
}

#[async_trait]
impl SessionStore for FakeSessionStore {
    async fn register_session(&self, _session_id: &str, _user_id: UserId) -> AppResult<()> {
        Ok(())
    }

    async fn invalidate_all(&self, user_id: UserId) -> AppResult<()> {
        self.invalidations.lock().await.push(user_id);
        if *self.failing.lock().await {
            return Err(AppError::SideEffect("session store offline".to_owned()));
        }
        Ok(())
    }

    async fn bump_epoch(&self, user_id: UserId) -> AppResult<i64> {
        let mut bumps = self.bumps.lock().await;
        bumps.push(user_id);
        if *self.failing.lock().await {
            return Err(AppError::SideEffect("session store offline".to_owned()));
        }
        Ok(i64::try_from(bumps.len()).unwrap_or(i64::MAX))
    }

    async fn current_epoch(&self, user_id: UserId) -> AppResult<i64> {
        let count = self
            .bumps
            .lock()
            .await
            .iter()
            .filter(|bumped| **bumped == user_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[derive(Default)]
struct FakeNotifications {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationGateway for FakeNotifications {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

#[derive(Default)]
struct FakeAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditSink for FakeAuditSink {
    async fn record(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

struct Harness {
    service: AssignmentLifecycleService,
    repository: Arc<FakeRepository>,
    identity_documents: Arc<FakeIdentityDocuments>,
    markets: Arc<FakeMarkets>,
    sessions: Arc<FakeSessionStore>,
    notifications: Arc<FakeNotifications>,
    audit: Arc<FakeAuditSink>,
}

fn harness() -> Harness {
    harness_with(RoleRequirementPolicy::default())
}

fn harness_with(policy: RoleRequirementPolicy) -> Harness {
    let repository = Arc::new(FakeRepository::default());
    let identity_documents = Arc::new(FakeIdentityDocuments::default());
    let markets = Arc::new(FakeMarkets::default());
    let sessions = Arc::new(FakeSessionStore::default());
    let notifications = Arc::new(FakeNotifications::default());
    let audit = Arc::new(FakeAuditSink::default());

    let service = AssignmentLifecycleService::new(
        AssignmentLifecyclePorts {
            repository: repository.clone(),
            blob_store: Arc::new(FakeBlobStore::default()),
            identity_documents: identity_documents.clone(),
            markets: markets.clone(),
            sessions: sessions.clone(),
            notifications: notifications.clone(),
            audit_sink: audit.clone(),
        },
        policy,
    );

    Harness {
        service,
        repository,
        identity_documents,
        markets,
        sessions,
        notifications,
        audit,
    }
}

fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[7u8; 64]);
    bytes
}

fn png_input(doc_type: &str) -> DocumentUploadInput {
    DocumentUploadInput {
        doc_type: doc_type.to_owned(),
        mime_type: "image/png".to_owned(),
        bytes: png_bytes(),
    }
}

impl Harness {
    async fn seed_user(&self, status: AccountStatus) -> UserId {
        let mut user = UserAccount::new_inactive("Market User", None, Utc::now());
        user.status = status;
        let user_id = user.id;
        self.repository.state.lock().await.users.insert(user_id, user);
        user_id
    }

    async fn seed_assignment(
        &self,
        user_id: UserId,
        role: Role,
        status: AssignmentStatus,
        market_id: Option<MarketId>,
    ) -> RoleAssignment {
        let mut assignment = RoleAssignment::new_pending(user_id, role, market_id, None, Utc::now());
        assignment.status = status;
        self.repository
            .state
            .lock()
            .await
            .assignments
            .insert(assignment.id, assignment.clone());
        assignment
    }

    async fn seed_document(
        &self,
        assignment_id: RoleAssignmentId,
        doc_type: &str,
        status: DocumentStatus,
    ) -> VerificationDocument {
        let upload =
            DocumentUpload::new(doc_type, "image/png", png_bytes(), UploadContext::Resubmission)
                .unwrap_or_else(|_| unreachable!());
        let mut document = VerificationDocument::new_pending(
            assignment_id,
            &upload,
            FileReference::new(format!("seed/{doc_type}.png")).unwrap_or_else(|_| unreachable!()),
            Utc::now(),
        );
        document.status = status;
        self.repository
            .state
            .lock()
            .await
            .documents
            .insert(document.id, document.clone());
        document
    }

    async fn super_admin(&self) -> ActorIdentity {
        let user_id = self.seed_user(AccountStatus::Active).await;
        self.seed_assignment(user_id, Role::SuperAdmin, AssignmentStatus::Active, None)
            .await;
        ActorIdentity::new(user_id, "Super Admin", 0)
    }

    async fn market_manager(&self, market_id: MarketId) -> ActorIdentity {
        let user_id = self.seed_user(AccountStatus::Active).await;
        self.seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Active, None)
            .await;
        self.markets.managers.lock().await.push((user_id, market_id));
        ActorIdentity::new(user_id, "Market Manager", 0)
    }

    async fn assignment(&self, assignment_id: RoleAssignmentId) -> RoleAssignment {
        self.repository
            .state
            .lock()
            .await
            .assignments
            .get(&assignment_id)
            .cloned()
            .unwrap_or_else(|| unreachable!())
    }

    async fn user(&self, user_id: UserId) -> UserAccount {
        self.repository
            .state
            .lock()
            .await
            .users
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| unreachable!())
    }

    async fn vendor_of(&self, user_id: UserId) -> Option<RoleAssignment> {
        self.repository
            .state
            .lock()
            .await
            .assignments
            .values()
            .find(|assignment| assignment.user_id == user_id && assignment.role == Role::Vendor)
            .cloned()
    }

    async fn audit_actions(&self) -> Vec<AuditAction> {
        self.audit
            .events
            .lock()
            .await
            .iter()
            .map(|event| event.action)
            .collect()
    }
}

#[tokio::test]
async fn self_registration_creates_inactive_user_with_pending_role() {
    let harness = harness();
    // The bootstrap attachment opens a second transaction after the first commit.
    let created = tokio::time::timeout(
        Duration::from_secs(5),
        harness.service.create_assignment(
            AssignmentInitiator::SelfRegistration,
            CreateAssignmentInput {
                subject: AssignmentSubject::NewAccount {
                    display_name: "Aling Nena".to_owned(),
                    email: Some("nena@market.ph".to_owned()),
                },
                role: Role::Vendor,
                market_id: None,
                bootstrap_document: Some(DocumentUploadInput {
                    doc_type: "government_id".to_owned(),
                    mime_type: "application/pdf".to_owned(),
                    bytes: b"%PDF-1.4 scanned id".to_vec(),
                }),
            },
        ),
    )
    .await
    .unwrap_or_else(|_| unreachable!())
    .unwrap_or_else(|_| unreachable!());

    assert!(created.created_user);
    assert_eq!(created.assignment.status, AssignmentStatus::Pending);
    let user = harness.user(created.assignment.user_id).await;
    assert_eq!(user.status, AccountStatus::Inactive);

    let document = created.bootstrap_document.unwrap_or_else(|| unreachable!());
    assert_eq!(document.doc_type, DocumentType::Id);
    assert_eq!(document.status, DocumentStatus::Pending);
    assert_eq!(
        harness.audit_actions().await,
        vec![AuditAction::RoleAssignmentCreated, AuditAction::DocumentAttached]
    );
}

#[tokio::test]
async fn invalid_bootstrap_document_does_not_fail_creation() {
    let harness = harness();
    let created = harness
        .service
        .create_assignment(
            AssignmentInitiator::SelfRegistration,
            CreateAssignmentInput {
                subject: AssignmentSubject::NewAccount {
                    display_name: "Mang Tonyo".to_owned(),
                    email: None,
                },
                role: Role::MarketManager,
                market_id: None,
                bootstrap_document: Some(DocumentUploadInput {
                    doc_type: "permit".to_owned(),
                    mime_type: "image/gif".to_owned(),
                    bytes: b"GIF89a".to_vec(),
                }),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(created.bootstrap_document.is_none());
    assert_eq!(created.assignment.status, AssignmentStatus::Pending);
}

#[tokio::test]
async fn self_registration_cannot_request_staff_roles() {
    let harness = harness();
    let result = harness
        .service
        .create_assignment(
            AssignmentInitiator::SelfRegistration,
            CreateAssignmentInput {
                subject: AssignmentSubject::NewAccount {
                    display_name: "Someone".to_owned(),
                    email: None,
                },
                role: Role::Inspector,
                market_id: None,
                bootstrap_document: None,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Authorization(_))));
    assert!(harness.repository.state.lock().await.users.is_empty());
}

#[tokio::test]
async fn market_manager_grants_field_roles_only_in_own_market() {
    let harness = harness();
    let own_market = MarketId::new();
    let manager = harness.market_manager(own_market).await;
    let staff = harness.seed_user(AccountStatus::Active).await;

    let granted = harness
        .service
        .create_assignment(
            AssignmentInitiator::Actor(&manager),
            CreateAssignmentInput {
                subject: AssignmentSubject::Existing(staff),
                role: Role::Inspector,
                market_id: Some(own_market),
                bootstrap_document: None,
            },
        )
        .await;
    assert!(granted.is_ok());

    let foreign = harness
        .service
        .create_assignment(
            AssignmentInitiator::Actor(&manager),
            CreateAssignmentInput {
                subject: AssignmentSubject::Existing(staff),
                role: Role::Accountant,
                market_id: Some(MarketId::new()),
                bootstrap_document: None,
            },
        )
        .await;
    assert!(matches!(foreign, Err(AppError::Authorization(_))));

    let elevated = harness
        .service
        .create_assignment(
            AssignmentInitiator::Actor(&manager),
            CreateAssignmentInput {
                subject: AssignmentSubject::Existing(staff),
                role: Role::SuperAdmin,
                market_id: Some(own_market),
                bootstrap_document: None,
            },
        )
        .await;
    assert!(matches!(elevated, Err(AppError::Authorization(_))));
}

#[tokio::test]
async fn create_reopens_closed_rows_and_refuses_honored_ones() {
    let harness = harness();
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let actor = ActorIdentity::new(user_id, "Vendor", 0);
    let revoked = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Revoked, None)
        .await;
    harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Active, None)
        .await;

    let reopened = harness
        .service
        .create_assignment(
            AssignmentInitiator::Actor(&actor),
            CreateAssignmentInput {
                subject: AssignmentSubject::Existing(user_id),
                role: Role::MarketManager,
                market_id: None,
                bootstrap_document: None,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(reopened.assignment.id, revoked.id);
    assert_eq!(reopened.assignment.status, AssignmentStatus::Pending);
    assert!(reopened.assignment.admin_notes.contains("re-requested"));

    let again = harness
        .service
        .create_assignment(
            AssignmentInitiator::Actor(&actor),
            CreateAssignmentInput {
                subject: AssignmentSubject::Existing(user_id),
                role: Role::Vendor,
                market_id: None,
                bootstrap_document: None,
            },
        )
        .await;
    match again {
        Err(error @ AppError::InvalidState { .. }) => {
            assert_eq!(error.current_status(), Some("active"));
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn approved_permit_activates_manager_and_supersedes_vendor() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Inactive).await;
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Active, None)
        .await;
    let manager = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::UnderReview, None)
        .await;
    harness
        .seed_document(manager.id, "permit", DocumentStatus::Approved)
        .await;
    harness
        .seed_document(manager.id, "id", DocumentStatus::Rejected)
        .await;

    let reviewed = harness
        .service
        .review_assignment(&admin, manager.id, false)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(reviewed.status, AssignmentStatus::Active);
    assert!(reviewed.admin_notes.contains("under_review -> active"));
    assert_eq!(
        harness.assignment(vendor.id).await.status,
        AssignmentStatus::Inactive
    );
    let user = harness.user(user_id).await;
    assert_eq!(user.status, AccountStatus::Active);
    assert_eq!(user.legacy_role, Some(LegacyRole::Admin));
    assert_eq!(*harness.sessions.invalidations.lock().await, vec![user_id]);
    assert!(
        harness
            .audit_actions()
            .await
            .contains(&AuditAction::RoleAssignmentSuperseded)
    );
}

#[tokio::test]
async fn partial_vendor_evidence_is_provisional() {
    let harness = harness_with(RoleRequirementPolicy::new(VendorEvidence::IdAndPermit));
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Inactive).await;
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Pending, None)
        .await;
    harness
        .seed_document(vendor.id, "id", DocumentStatus::Approved)
        .await;
    harness
        .seed_document(vendor.id, "permit", DocumentStatus::Pending)
        .await;

    let reviewed = harness
        .service
        .review_assignment(&admin, vendor.id, false)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(reviewed.status, AssignmentStatus::ProvisionalActive);
    let user = harness.user(user_id).await;
    assert_eq!(user.status, AccountStatus::Active);
    assert_eq!(user.legacy_role, Some(LegacyRole::Vendor));
}

#[tokio::test]
async fn full_activation_from_provisional_invalidates_sessions() {
    let harness = harness_with(RoleRequirementPolicy::new(VendorEvidence::IdAndPermit));
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::ProvisionalActive, None)
        .await;
    harness
        .seed_document(vendor.id, "id", DocumentStatus::Approved)
        .await;
    let permit = harness
        .seed_document(vendor.id, "permit", DocumentStatus::Pending)
        .await;

    let outcome = harness
        .service
        .approve_document(&admin, permit.id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        outcome.change.map(|change| (change.from, change.to)),
        Some((AssignmentStatus::ProvisionalActive, AssignmentStatus::Active))
    );
    assert_eq!(*harness.sessions.invalidations.lock().await, vec![user_id]);
    assert_eq!(harness.sessions.bumps.lock().await.len(), 1);
}

#[tokio::test]
async fn document_promotion_out_of_pending_clears_resubmission_reason() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Inactive).await;
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Pending, None)
        .await;
    harness
        .repository
        .state
        .lock()
        .await
        .assignments
        .entry(vendor.id)
        .and_modify(|assignment| {
            assignment.resubmission_reason = Some("photo is blurred".to_owned());
        });
    let id_document = harness
        .seed_document(vendor.id, "id", DocumentStatus::Pending)
        .await;

    let outcome = harness
        .service
        .approve_document(&admin, id_document.id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(outcome.assignment.status, AssignmentStatus::Active);
    assert!(outcome.assignment.resubmission_reason.is_none());
    assert!(
        harness
            .assignment(vendor.id)
            .await
            .resubmission_reason
            .is_none()
    );
}

#[tokio::test]
async fn force_activation_is_super_admin_only_and_blocked_by_rejections() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let market_id = MarketId::new();
    let manager = harness.market_manager(market_id).await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let inspector = harness
        .seed_assignment(
            user_id,
            Role::Inspector,
            AssignmentStatus::UnderReview,
            Some(market_id),
        )
        .await;

    let by_manager = harness
        .service
        .review_assignment(&manager, inspector.id, true)
        .await;
    assert!(matches!(by_manager, Err(AppError::Authorization(_))));

    let forced = harness
        .service
        .review_assignment(&admin, inspector.id, true)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(forced.status, AssignmentStatus::Active);
    assert!(forced.admin_notes.contains("FORCE ACTIVATED"));
    assert!(
        harness
            .audit_actions()
            .await
            .contains(&AuditAction::RoleAssignmentForceActivated)
    );

    let applicant = harness.seed_user(AccountStatus::Inactive).await;
    let blocked = harness
        .seed_assignment(applicant, Role::MarketManager, AssignmentStatus::Rejected, None)
        .await;
    harness
        .seed_document(blocked.id, "permit", DocumentStatus::Rejected)
        .await;
    let result = harness
        .service
        .review_assignment(&admin, blocked.id, true)
        .await;
    assert!(matches!(result, Err(AppError::InvalidState { .. })));
    assert_eq!(
        harness.assignment(blocked.id).await.status,
        AssignmentStatus::Rejected
    );
}

#[tokio::test]
async fn review_of_revoked_assignment_reports_current_status() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let revoked = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Revoked, None)
        .await;

    let result = harness
        .service
        .review_assignment(&admin, revoked.id, false)
        .await;
    match result {
        Err(error) => assert_eq!(error.current_status(), Some("revoked")),
        Ok(_) => unreachable!(),
    }
}

#[tokio::test]
async fn field_role_without_approval_keeps_status_and_uses_identity_fallback() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let accountant = harness
        .seed_assignment(
            user_id,
            Role::Accountant,
            AssignmentStatus::ProvisionalActive,
            Some(MarketId::new()),
        )
        .await;
    harness
        .seed_document(accountant.id, "id", DocumentStatus::Rejected)
        .await;

    let unchanged = harness
        .service
        .review_assignment(&admin, accountant.id, false)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(unchanged.status, AssignmentStatus::ProvisionalActive);
    assert!(harness.sessions.invalidations.lock().await.is_empty());

    harness
        .identity_documents
        .statuses
        .lock()
        .await
        .insert(
            user_id,
            [(DocumentType::Permit, DocumentStatus::Approved)]
                .into_iter()
                .collect(),
        );
    let promoted = harness
        .service
        .review_assignment(&admin, accountant.id, false)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(promoted.status, AssignmentStatus::Active);
}

#[tokio::test]
async fn approving_an_optional_document_never_demotes() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let manager = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Active, None)
        .await;
    harness
        .seed_document(manager.id, "permit", DocumentStatus::Pending)
        .await;
    let id_document = harness
        .seed_document(manager.id, "id", DocumentStatus::Pending)
        .await;

    let outcome = harness
        .service
        .approve_document(&admin, id_document.id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(outcome.document.status, DocumentStatus::Approved);
    assert_eq!(outcome.assignment.status, AssignmentStatus::Active);
    assert!(outcome.change.is_none());
}

#[tokio::test]
async fn rejecting_a_required_document_demotes_and_invalidates_sessions() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Active, None)
        .await;
    let id_document = harness
        .seed_document(vendor.id, "id", DocumentStatus::Approved)
        .await;

    let empty_reason = harness
        .service
        .reject_document(&admin, id_document.id, "   ")
        .await;
    assert!(matches!(empty_reason, Err(AppError::Validation(_))));

    let outcome = harness
        .service
        .reject_document(&admin, id_document.id, "photo is unreadable")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(outcome.document.status, DocumentStatus::Rejected);
    assert!(outcome.document.admin_notes.contains("photo is unreadable"));
    assert_eq!(outcome.assignment.status, AssignmentStatus::Rejected);
    assert_eq!(*harness.sessions.invalidations.lock().await, vec![user_id]);
}

#[tokio::test]
async fn documents_of_revoked_assignments_are_frozen() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let revoked = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Revoked, None)
        .await;
    let permit = harness
        .seed_document(revoked.id, "permit", DocumentStatus::Pending)
        .await;

    let result = harness.service.approve_document(&admin, permit.id).await;
    assert!(matches!(result, Err(AppError::InvalidState { .. })));
    let stored = harness
        .repository
        .find_document(permit.id)
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_else(|| unreachable!());
    assert_eq!(stored.status, DocumentStatus::Pending);
}

#[tokio::test]
async fn resubmission_replaces_rejected_document_and_clears_rejection() {
    let harness = harness();
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let owner = ActorIdentity::new(user_id, "Applicant", 0);
    let manager = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Rejected, None)
        .await;
    let permit = harness
        .seed_document(manager.id, "permit", DocumentStatus::Rejected)
        .await;

    let resubmitted = harness
        .service
        .resubmit(
            &owner,
            manager.id,
            ResubmissionInput {
                documents: vec![png_input("business_permit")],
                note: Some("renewed permit".to_owned()),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(resubmitted.status, AssignmentStatus::UnderReview);
    assert!(resubmitted.resubmission_reason.is_none());
    assert!(resubmitted.admin_notes.contains("renewed permit"));

    let replaced = harness
        .repository
        .find_document(permit.id)
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_else(|| unreachable!());
    assert_eq!(replaced.status, DocumentStatus::Pending);
    assert!(replaced.admin_notes.contains("seed/permit.png"));
}

#[tokio::test]
async fn resubmission_must_cover_every_required_type() {
    let harness = harness_with(RoleRequirementPolicy::new(VendorEvidence::IdAndPermit));
    let user_id = harness.seed_user(AccountStatus::Inactive).await;
    let owner = ActorIdentity::new(user_id, "Applicant", 0);
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Rejected, None)
        .await;
    harness
        .seed_document(vendor.id, "id", DocumentStatus::Rejected)
        .await;

    let result = harness
        .service
        .resubmit(
            &owner,
            vendor.id,
            ResubmissionInput {
                documents: vec![png_input("id")],
                note: None,
            },
        )
        .await;

    match result {
        Err(AppError::Validation(message)) => assert!(message.contains("permit")),
        _ => unreachable!(),
    }
    assert_eq!(
        harness.assignment(vendor.id).await.status,
        AssignmentStatus::Rejected
    );
}

#[tokio::test]
async fn resubmission_rejects_pdf_and_foreign_submitters() {
    let harness = harness();
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let owner = ActorIdentity::new(user_id, "Applicant", 0);
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Rejected, None)
        .await;

    let pdf = harness
        .service
        .resubmit(
            &owner,
            vendor.id,
            ResubmissionInput {
                documents: vec![DocumentUploadInput {
                    doc_type: "id".to_owned(),
                    mime_type: "application/pdf".to_owned(),
                    bytes: b"%PDF-1.7".to_vec(),
                }],
                note: None,
            },
        )
        .await;
    assert!(matches!(pdf, Err(AppError::Validation(_))));

    let stranger = ActorIdentity::new(harness.seed_user(AccountStatus::Active).await, "Other", 0);
    let foreign = harness
        .service
        .resubmit(
            &stranger,
            vendor.id,
            ResubmissionInput {
                documents: vec![png_input("id")],
                note: None,
            },
        )
        .await;
    assert!(matches!(foreign, Err(AppError::Authorization(_))));
}

#[tokio::test]
async fn revoking_the_last_elevated_role_restores_the_vendor_role() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Inactive, None)
        .await;
    let manager = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Active, None)
        .await;

    let empty_reason = harness.service.revoke(&admin, manager.id, "").await;
    assert!(matches!(empty_reason, Err(AppError::Validation(_))));

    let revoked = harness
        .service
        .revoke(&admin, manager.id, "left the market office")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(revoked.status, AssignmentStatus::Revoked);
    assert_eq!(
        harness.assignment(vendor.id).await.status,
        AssignmentStatus::Active
    );
    assert_eq!(
        harness.user(user_id).await.legacy_role,
        Some(LegacyRole::Vendor)
    );
    assert_eq!(*harness.sessions.invalidations.lock().await, vec![user_id]);

    let again = harness.service.revoke(&admin, manager.id, "twice").await;
    assert!(matches!(again, Err(AppError::InvalidState { .. })));
}

#[tokio::test]
async fn revocation_creates_a_vendor_role_when_none_exists() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let manager = harness
        .seed_assignment(
            user_id,
            Role::MarketManager,
            AssignmentStatus::ProvisionalActive,
            None,
        )
        .await;

    harness
        .service
        .revoke(&admin, manager.id, "duplicate account")
        .await
        .unwrap_or_else(|_| unreachable!());

    let vendor = harness
        .vendor_of(user_id)
        .await
        .unwrap_or_else(|| unreachable!());
    assert_eq!(vendor.status, AssignmentStatus::Active);
}

#[tokio::test]
async fn revocation_keeps_vendor_closed_while_another_elevated_role_is_honored() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Inactive, None)
        .await;
    let manager = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Active, None)
        .await;
    harness
        .seed_assignment(
            user_id,
            Role::SuperAdmin,
            AssignmentStatus::ProvisionalActive,
            None,
        )
        .await;

    harness
        .service
        .revoke(&admin, manager.id, "role consolidated")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        harness.assignment(vendor.id).await.status,
        AssignmentStatus::Inactive
    );
    assert_eq!(
        harness.user(user_id).await.legacy_role,
        Some(LegacyRole::Admin)
    );
}

#[tokio::test]
async fn revocation_leaves_rejected_vendor_alone() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Rejected, None)
        .await;
    let manager = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Active, None)
        .await;

    harness
        .service
        .revoke(&admin, manager.id, "inactive for a year")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        harness.assignment(vendor.id).await.status,
        AssignmentStatus::Rejected
    );
}

#[tokio::test]
async fn session_failures_are_swallowed_and_attempted_once() {
    let harness = harness();
    let admin = harness.super_admin().await;
    *harness.sessions.failing.lock().await = true;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Inactive, None)
        .await;
    let manager = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Active, None)
        .await;

    let revoked = harness
        .service
        .revoke(&admin, manager.id, "fraudulent permit")
        .await;

    assert!(revoked.is_ok());
    assert_eq!(harness.sessions.invalidations.lock().await.len(), 1);
    assert_eq!(harness.sessions.bumps.lock().await.len(), 1);
}

#[tokio::test]
async fn resubmission_request_reopens_a_provisional_assignment() {
    let harness = harness_with(RoleRequirementPolicy::new(VendorEvidence::IdAndPermit));
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let owner = ActorIdentity::new(user_id, "Vendor", 0);
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::ProvisionalActive, None)
        .await;
    harness
        .seed_document(vendor.id, "id", DocumentStatus::Approved)
        .await;

    let requested = harness
        .service
        .request_resubmission(&admin, vendor.id, "please add your stall permit")
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(requested.status, AssignmentStatus::Pending);
    assert_eq!(
        requested.resubmission_reason.as_deref(),
        Some("please add your stall permit")
    );
    assert_eq!(*harness.sessions.invalidations.lock().await, vec![user_id]);

    let resubmitted = harness
        .service
        .resubmit(
            &owner,
            vendor.id,
            ResubmissionInput {
                documents: vec![png_input("permit")],
                note: None,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(resubmitted.status, AssignmentStatus::ProvisionalActive);
    assert!(resubmitted.resubmission_reason.is_none());
}

#[tokio::test]
async fn concurrent_reviews_serialize_on_the_assignment() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let vendor = harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::Active, None)
        .await;
    let manager = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::UnderReview, None)
        .await;
    harness
        .seed_document(manager.id, "permit", DocumentStatus::Approved)
        .await;

    let (first, second) = tokio::join!(
        harness.service.review_assignment(&admin, manager.id, false),
        harness.service.review_assignment(&admin, manager.id, false),
    );
    let outcomes = [first, second];
    let succeeded = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(outcomes.iter().any(|outcome| matches!(
        outcome,
        Err(error) if error.current_status() == Some("active")
    )));

    let stored = harness.assignment(manager.id).await;
    assert_eq!(stored.status, AssignmentStatus::Active);
    assert_eq!(stored.admin_notes.lines().count(), 1);
    assert_eq!(
        harness.assignment(vendor.id).await.status,
        AssignmentStatus::Inactive
    );
    assert_eq!(harness.sessions.invalidations.lock().await.len(), 1);
    let superseded = harness
        .audit_actions()
        .await
        .into_iter()
        .filter(|action| *action == AuditAction::RoleAssignmentSuperseded)
        .count();
    assert_eq!(superseded, 1);
}

#[tokio::test]
async fn review_queue_is_scoped_to_managed_markets() {
    let harness = harness();
    let admin = harness.super_admin().await;
    let market_id = MarketId::new();
    let manager = harness.market_manager(market_id).await;
    let staff = harness.seed_user(AccountStatus::Active).await;
    let other = harness.seed_user(AccountStatus::Active).await;
    let own = harness
        .seed_assignment(staff, Role::Inspector, AssignmentStatus::Pending, Some(market_id))
        .await;
    harness
        .seed_assignment(other, Role::Inspector, AssignmentStatus::Pending, Some(MarketId::new()))
        .await;
    harness
        .seed_assignment(other, Role::Vendor, AssignmentStatus::Pending, None)
        .await;

    let scoped = harness
        .service
        .review_queue(&manager, AssignmentStatus::Pending)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(
        scoped.iter().map(|assignment| assignment.id).collect::<Vec<_>>(),
        vec![own.id]
    );

    let everything = harness
        .service
        .review_queue(&admin, AssignmentStatus::Pending)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(everything.len(), 3);

    let member = ActorIdentity::new(staff, "Staff", 0);
    let denied = harness
        .service
        .review_queue(&member, AssignmentStatus::Pending)
        .await;
    assert!(matches!(denied, Err(AppError::Authorization(_))));
}

#[tokio::test]
async fn details_and_honored_roles_reflect_evidence() {
    let harness = harness();
    let user_id = harness.seed_user(AccountStatus::Active).await;
    let owner = ActorIdentity::new(user_id, "Applicant", 0);
    harness
        .seed_assignment(user_id, Role::Vendor, AssignmentStatus::ProvisionalActive, None)
        .await;
    let manager = harness
        .seed_assignment(user_id, Role::MarketManager, AssignmentStatus::Rejected, None)
        .await;
    harness
        .seed_document(manager.id, "permit", DocumentStatus::Rejected)
        .await;

    let details = harness
        .service
        .assignment_details(&owner, manager.id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(details.documents.len(), 1);
    assert_eq!(details.outstanding, vec![DocumentType::Permit]);

    let stranger = ActorIdentity::new(harness.seed_user(AccountStatus::Active).await, "Other", 0);
    let denied = harness
        .service
        .assignment_details(&stranger, manager.id)
        .await;
    assert!(matches!(denied, Err(AppError::Authorization(_))));

    let roles = harness
        .service
        .honored_roles(user_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(roles, vec![Role::Vendor]);
    assert!(harness.notifications.sent.lock().await.is_empty());
}
