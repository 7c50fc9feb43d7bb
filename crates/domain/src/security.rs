use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by the role workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A role assignment was requested, granted or re-requested.
    RoleAssignmentCreated,
    /// A reviewer recomputed the assignment status.
    RoleAssignmentReviewed,
    /// A reviewer overrode the computed status with `active`.
    RoleAssignmentForceActivated,
    /// A reviewer invited the applicant to resubmit.
    RoleAssignmentResubmissionRequested,
    /// The applicant resubmitted documents.
    RoleAssignmentResubmitted,
    /// A reviewer revoked the assignment.
    RoleAssignmentRevoked,
    /// A side effect changed a sibling assignment.
    RoleAssignmentSuperseded,
    /// A document was attached at creation time.
    DocumentAttached,
    /// A reviewer approved a document.
    DocumentApproved,
    /// A reviewer rejected a document.
    DocumentRejected,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleAssignmentCreated => "role_assignment.created",
            Self::RoleAssignmentReviewed => "role_assignment.reviewed",
            Self::RoleAssignmentForceActivated => "role_assignment.force_activated",
            Self::RoleAssignmentResubmissionRequested => "role_assignment.resubmission_requested",
            Self::RoleAssignmentResubmitted => "role_assignment.resubmitted",
            Self::RoleAssignmentRevoked => "role_assignment.revoked",
            Self::RoleAssignmentSuperseded => "role_assignment.superseded",
            Self::DocumentAttached => "document.attached",
            Self::DocumentApproved => "document.approved",
            Self::DocumentRejected => "document.rejected",
        }
    }
}
