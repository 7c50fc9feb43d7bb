use std::sync::Arc;

use marketgate_application::{
    AssignmentLifecyclePorts, AssignmentLifecycleService, NotificationGateway,
    RoleAssignmentRepository, SessionStore,
};
use marketgate_domain::RoleRequirementPolicy;
use marketgate_infrastructure::{
    ConsoleNotificationGateway, LocalDocumentBlobStore, PostgresAuditSink,
    PostgresIdentityDocumentFallback, PostgresMarketDirectory, PostgresNotificationGateway,
    PostgresRoleAssignmentRepository, PostgresSessionStore,
};
use sqlx::PgPool;

use crate::api_config::{ApiConfig, NotificationProviderConfig};
use crate::state::AppState;

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> AppState {
    let repository: Arc<dyn RoleAssignmentRepository> =
        Arc::new(PostgresRoleAssignmentRepository::new(pool.clone()));
    let sessions: Arc<dyn SessionStore> = Arc::new(PostgresSessionStore::new(pool.clone()));
    let notifications: Arc<dyn NotificationGateway> = match config.notification_provider {
        NotificationProviderConfig::Console => Arc::new(ConsoleNotificationGateway::new()),
        NotificationProviderConfig::Postgres => {
            Arc::new(PostgresNotificationGateway::new(pool.clone()))
        }
    };

    let lifecycle_service = AssignmentLifecycleService::new(
        AssignmentLifecyclePorts {
            repository: repository.clone(),
            blob_store: Arc::new(LocalDocumentBlobStore::new(
                config.document_storage_dir.clone(),
            )),
            identity_documents: Arc::new(PostgresIdentityDocumentFallback::new(pool.clone())),
            markets: Arc::new(PostgresMarketDirectory::new(pool.clone())),
            sessions: sessions.clone(),
            notifications,
            audit_sink: Arc::new(PostgresAuditSink::new(pool)),
        },
        RoleRequirementPolicy::new(config.vendor_evidence),
    );

    AppState {
        lifecycle_service,
        repository,
        sessions,
        frontend_url: config.frontend_url.clone(),
        bootstrap_token: config.bootstrap_token.clone(),
    }
}
