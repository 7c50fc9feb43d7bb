//! Application services and ports.

#![forbid(unsafe_code)]

mod assignment_lifecycle_service;
mod assignment_ports;
mod side_effect_coordinator;

pub use assignment_lifecycle_service::{
    AssignmentDetails, AssignmentInitiator, AssignmentLifecyclePorts, AssignmentLifecycleService,
    AssignmentSubject, CreateAssignmentInput, CreatedAssignment, DocumentReviewOutcome,
    DocumentUploadInput, ResubmissionInput,
};
pub use assignment_ports::{
    AssignmentTransaction, AuditEvent, AuditSink, DocumentBlobStore, IdentityDocumentFallback,
    MarketDirectory, Notification, NotificationCategory, NotificationGateway,
    NotificationSeverity, RoleAssignmentRepository, SessionStore,
};
pub use side_effect_coordinator::{
    SessionInvalidation, SideEffectCoordinator, SideEffectMode, SideEffectReport, SiblingChange,
};
