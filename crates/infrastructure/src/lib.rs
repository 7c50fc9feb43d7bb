//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_notification_gateway;
mod in_memory_document_blob_store;
mod in_memory_role_assignment_store;
mod local_document_blob_store;
mod postgres_audit_sink;
mod postgres_identity_document_fallback;
mod postgres_market_directory;
mod postgres_notification_gateway;
mod postgres_role_assignment_repository;
mod postgres_session_store;

pub use console_notification_gateway::ConsoleNotificationGateway;
pub use in_memory_document_blob_store::InMemoryDocumentBlobStore;
pub use in_memory_role_assignment_store::InMemoryRoleAssignmentStore;
pub use local_document_blob_store::LocalDocumentBlobStore;
pub use postgres_audit_sink::PostgresAuditSink;
pub use postgres_identity_document_fallback::PostgresIdentityDocumentFallback;
pub use postgres_market_directory::PostgresMarketDirectory;
pub use postgres_notification_gateway::PostgresNotificationGateway;
pub use postgres_role_assignment_repository::PostgresRoleAssignmentRepository;
pub use postgres_session_store::PostgresSessionStore;
