use chrono::{Duration, Utc};
use marketgate_application::{
    IdentityDocumentFallback, MarketDirectory, RoleAssignmentRepository, SessionStore,
};
use marketgate_core::{AppError, UserId};
use marketgate_domain::{
    AccountStatus, AssignmentStatus, DocumentStatus, DocumentType, DocumentUpload, FileReference,
    LegacyRole, MarketId, Role, RoleAssignment, UploadContext, UserAccount, VerificationDocument,
};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresRoleAssignmentRepository;
use crate::{PostgresIdentityDocumentFallback, PostgresMarketDirectory, PostgresSessionStore};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres role assignment tests: {error}");
    }

    Some(pool)
}

async fn insert_user(repository: &PostgresRoleAssignmentRepository) -> UserId {
    let user = UserAccount::new_inactive("Fish Stall", None, Utc::now());
    let user_id = user.id;

    let mut transaction = repository
        .begin()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(transaction.insert_user(&user).await.is_ok());
    assert!(transaction.commit().await.is_ok());

    user_id
}

async fn insert_assignment(
    repository: &PostgresRoleAssignmentRepository,
    user_id: UserId,
    role: Role,
) -> RoleAssignment {
    let assignment = RoleAssignment::new_pending(user_id, role, None, None, Utc::now());

    let mut transaction = repository
        .begin()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(transaction.lock_user(user_id).await.is_ok());
    assert!(transaction.insert_assignment(&assignment).await.is_ok());
    assert!(transaction.commit().await.is_ok());

    assignment
}

fn png_document(assignment: &RoleAssignment, doc_type: &str) -> VerificationDocument {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[9u8; 24]);
    let upload = DocumentUpload::new(doc_type, "image/png", bytes, UploadContext::Resubmission)
        .unwrap_or_else(|_| unreachable!());
    VerificationDocument::new_pending(
        assignment.id,
        &upload,
        FileReference::new(format!("{}/{doc_type}.png", assignment.id))
            .unwrap_or_else(|_| unreachable!()),
        Utc::now(),
    )
}

#[tokio::test]
async fn committed_writes_round_trip_and_rollback_discards() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleAssignmentRepository::new(pool);
    let user_id = insert_user(&repository).await;
    let assignment = insert_assignment(&repository, user_id, Role::MarketManager).await;

    {
        let mut transaction = repository
            .begin()
            .await
            .unwrap_or_else(|_| unreachable!());
        let mut locked = transaction
            .lock_assignment(assignment.id)
            .await
            .unwrap_or_else(|_| unreachable!());
        locked.transition_to(AssignmentStatus::Active, Utc::now());
        assert!(transaction.update_assignment(&locked).await.is_ok());
    }

    let stored = repository.find_assignment(assignment.id).await;
    assert_eq!(
        stored.ok().flatten().map(|stored| stored.status),
        Some(AssignmentStatus::Pending)
    );

    let mut transaction = repository
        .begin()
        .await
        .unwrap_or_else(|_| unreachable!());
    let mut locked = transaction
        .lock_assignment(assignment.id)
        .await
        .unwrap_or_else(|_| unreachable!());
    locked.transition_to(AssignmentStatus::UnderReview, Utc::now());
    locked.append_note("moved to review", Utc::now());
    assert!(transaction.update_assignment(&locked).await.is_ok());
    assert!(
        transaction
            .update_user_access(user_id, AccountStatus::Active, Some(LegacyRole::Admin))
            .await
            .is_ok()
    );
    assert!(transaction.commit().await.is_ok());

    let stored = repository
        .find_assignment(assignment.id)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(stored.status, AssignmentStatus::UnderReview);
    assert!(stored.admin_notes.contains("moved to review"));

    let user = repository
        .find_user(user_id)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(user.status, AccountStatus::Active);
    assert_eq!(user.legacy_role, Some(LegacyRole::Admin));

    let queue = repository
        .list_assignments_by_status(AssignmentStatus::UnderReview)
        .await
        .unwrap_or_default();
    assert!(queue.iter().any(|queued| queued.id == assignment.id));
}

#[tokio::test]
async fn user_role_pair_is_unique() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleAssignmentRepository::new(pool);
    let user_id = insert_user(&repository).await;
    insert_assignment(&repository, user_id, Role::Vendor).await;

    let mut transaction = repository
        .begin()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(transaction.lock_user(user_id).await.is_ok());
    let duplicate = RoleAssignment::new_pending(user_id, Role::Vendor, None, None, Utc::now());
    let result = transaction.insert_assignment(&duplicate).await;
    assert!(matches!(result, Err(AppError::Persistence(_))));
}

#[tokio::test]
async fn documents_are_listed_oldest_first() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleAssignmentRepository::new(pool);
    let user_id = insert_user(&repository).await;
    let assignment = insert_assignment(&repository, user_id, Role::Inspector).await;

    let older = png_document(&assignment, "id");
    let mut newer = png_document(&assignment, "permit");
    newer.created_at = older.created_at + Duration::seconds(5);

    let mut transaction = repository
        .begin()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(transaction.lock_assignment(assignment.id).await.is_ok());
    assert!(transaction.insert_document(&newer).await.is_ok());
    assert!(transaction.insert_document(&older).await.is_ok());
    newer.reject(user_id, "expired", Utc::now());
    assert!(transaction.update_document(&newer).await.is_ok());
    assert!(transaction.commit().await.is_ok());

    let documents = repository
        .list_documents(assignment.id)
        .await
        .unwrap_or_default();
    assert_eq!(
        documents
            .iter()
            .map(|document| document.doc_type)
            .collect::<Vec<_>>(),
        vec![DocumentType::Id, DocumentType::Permit]
    );
    assert_eq!(documents[1].status, DocumentStatus::Rejected);

    let found = repository.find_document(older.id).await.ok().flatten();
    assert_eq!(found.map(|document| document.size_bytes), Some(32));
}

#[tokio::test]
async fn lock_assignment_waits_for_owner_lock() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleAssignmentRepository::new(pool);
    let user_id = insert_user(&repository).await;
    let assignment = insert_assignment(&repository, user_id, Role::Accountant).await;

    let mut first = repository
        .begin()
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(first.lock_user(user_id).await.is_ok());

    let mut second = repository
        .begin()
        .await
        .unwrap_or_else(|_| unreachable!());
    let blocked = tokio::time::timeout(
        std::time::Duration::from_millis(100),
        second.lock_assignment(assignment.id),
    )
    .await;
    assert!(blocked.is_err());
    drop(second);

    assert!(first.commit().await.is_ok());
}

#[tokio::test]
async fn session_epoch_and_registry() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleAssignmentRepository::new(pool.clone());
    let sessions = PostgresSessionStore::new(pool.clone());
    let user_id = insert_user(&repository).await;

    assert_eq!(sessions.current_epoch(user_id).await.ok(), Some(0));
    assert_eq!(sessions.bump_epoch(user_id).await.ok(), Some(1));
    assert_eq!(sessions.current_epoch(user_id).await.ok(), Some(1));

    let session_id = uuid::Uuid::new_v4().to_string();
    assert!(
        sessions
            .register_session(session_id.as_str(), user_id)
            .await
            .is_ok()
    );
    assert!(sessions.invalidate_all(user_id).await.is_ok());

    let remaining = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM user_sessions
        WHERE user_id = $1
        "#,
    )
    .bind(user_id.as_uuid())
    .fetch_one(&pool)
    .await;
    assert_eq!(remaining.ok(), Some(0));

    assert!(matches!(
        sessions.bump_epoch(UserId::new()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn market_scope_and_identity_documents() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresRoleAssignmentRepository::new(pool.clone());
    let markets = PostgresMarketDirectory::new(pool.clone());
    let identity = PostgresIdentityDocumentFallback::new(pool.clone());
    let manager_id = insert_user(&repository).await;
    let market_id = MarketId::new();

    let inserted = sqlx::query(
        r#"
        INSERT INTO markets (id, name, manager_id)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(market_id.as_uuid())
    .bind("Riverside Market")
    .bind(manager_id.as_uuid())
    .execute(&pool)
    .await;
    assert!(inserted.is_ok());

    assert_eq!(
        markets.is_market_manager(manager_id, market_id).await.ok(),
        Some(true)
    );
    assert_eq!(
        markets.markets_managed_by(manager_id).await.unwrap_or_default(),
        vec![market_id]
    );

    for (status, age) in [("rejected", 10), ("approved", 1)] {
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_identity_documents (id, user_id, doc_type, status, file_reference, created_at)
            VALUES ($1, $2, 'id', $3, 'legacy/id.png', now() - make_interval(secs => $4))
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(manager_id.as_uuid())
        .bind(status)
        .bind(f64::from(age))
        .execute(&pool)
        .await;
        assert!(inserted.is_ok());
    }

    let statuses = identity.latest_by_type(manager_id).await.unwrap_or_default();
    assert_eq!(statuses.get(&DocumentType::Id), Some(&DocumentStatus::Approved));
}
