//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod assignment;
mod document;
mod requirement_policy;
mod role;
mod security;
mod status_resolver;
mod user;

pub use assignment::{AssignmentStatus, MarketId, RoleAssignment, RoleAssignmentId, StatusChange};
pub use document::{
    DocumentId, DocumentMimeType, DocumentStatus, DocumentType, DocumentUpload, FileReference,
    MAX_DOCUMENT_BYTES, UploadContext, VerificationDocument, latest_by_type, latest_statuses,
};
pub use requirement_policy::{
    Combinator, REQUIREMENT_POLICY_VERSION, RoleRequirementPolicy, RoleRequirements,
    VendorEvidence,
};
pub use role::{LegacyRole, Role};
pub use security::AuditAction;
pub use status_resolver::{
    DocumentStatusMap, Resolution, can_force_active, has_rejected_requirement,
    outstanding_evidence, resolve_status, with_identity_fallback,
};
pub use user::{AccountStatus, EmailAddress, UserAccount};
