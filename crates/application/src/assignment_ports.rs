mod audit;
mod collaborators;
mod documents;
mod repository;

pub use audit::{AuditEvent, AuditSink};
pub use collaborators::{
    MarketDirectory, Notification, NotificationCategory, NotificationGateway,
    NotificationSeverity, SessionStore,
};
pub use documents::{DocumentBlobStore, IdentityDocumentFallback};
pub use repository::{AssignmentTransaction, RoleAssignmentRepository};
