//! Pure status computation from document evidence.

use std::collections::BTreeMap;

use crate::{AssignmentStatus, Combinator, DocumentStatus, DocumentType, RoleRequirements};

/// Latest known status per document type.
pub type DocumentStatusMap = BTreeMap<DocumentType, DocumentStatus>;

/// Outcome of a status computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The evidence determines this status.
    Status(AssignmentStatus),
    /// The evidence does not justify touching the current status.
    Unchanged,
}

impl Resolution {
    /// Returns the resolved status, or `current` when unchanged.
    #[must_use]
    pub fn or_current(self, current: AssignmentStatus) -> AssignmentStatus {
        match self {
            Self::Status(status) => status,
            Self::Unchanged => current,
        }
    }
}

/// Computes the target assignment status.
///
/// Under `All` only required types count. Under `Either` the result only ever
/// promotes: a rejected alternative never blocks an approved one.
#[must_use]
pub fn resolve_status(requirements: &RoleRequirements, statuses: &DocumentStatusMap) -> Resolution {
    match requirements.combinator() {
        Combinator::All => Resolution::Status(resolve_all(requirements.required(), statuses)),
        Combinator::Either => {
            let any_approved = requirements
                .accepted()
                .filter(DocumentType::is_identity_class)
                .any(|doc_type| statuses.get(&doc_type) == Some(&DocumentStatus::Approved));
            if any_approved {
                Resolution::Status(AssignmentStatus::Active)
            } else {
                Resolution::Unchanged
            }
        }
    }
}

fn resolve_all(required: &[DocumentType], statuses: &DocumentStatusMap) -> AssignmentStatus {
    let status_of = |doc_type: &DocumentType| statuses.get(doc_type).copied();

    if required
        .iter()
        .any(|doc_type| status_of(doc_type) == Some(DocumentStatus::Rejected))
    {
        return AssignmentStatus::Rejected;
    }

    let approved = required
        .iter()
        .filter(|doc_type| status_of(doc_type) == Some(DocumentStatus::Approved))
        .count();

    if !required.is_empty() && approved == required.len() {
        AssignmentStatus::Active
    } else if approved > 0 {
        AssignmentStatus::ProvisionalActive
    } else {
        AssignmentStatus::UnderReview
    }
}

/// Returns whether any required type is currently rejected.
#[must_use]
pub fn has_rejected_requirement(
    requirements: &RoleRequirements,
    statuses: &DocumentStatusMap,
) -> bool {
    requirements
        .required()
        .iter()
        .any(|doc_type| statuses.get(doc_type) == Some(&DocumentStatus::Rejected))
}

/// Returns whether an admin may override the computed status with `active`.
#[must_use]
pub fn can_force_active(requirements: &RoleRequirements, statuses: &DocumentStatusMap) -> bool {
    !has_rejected_requirement(requirements, statuses)
}

/// Returns required types still missing or rejected.
///
/// Under `Either` any pending or approved identity-class document settles
/// the requirement.
#[must_use]
pub fn outstanding_evidence(
    requirements: &RoleRequirements,
    statuses: &DocumentStatusMap,
) -> Vec<DocumentType> {
    let usable = |doc_type: &DocumentType| {
        matches!(
            statuses.get(doc_type),
            Some(DocumentStatus::Pending | DocumentStatus::Approved)
        )
    };

    match requirements.combinator() {
        Combinator::All => requirements
            .required()
            .iter()
            .filter(|doc_type| !usable(doc_type))
            .copied()
            .collect(),
        Combinator::Either => {
            let satisfied = requirements
                .accepted()
                .filter(DocumentType::is_identity_class)
                .any(|doc_type| usable(&doc_type));
            if satisfied {
                Vec::new()
            } else {
                requirements.required().to_vec()
            }
        }
    }
}

/// Fills types without a role-level document from user-level identity documents.
#[must_use]
pub fn with_identity_fallback(
    requirements: &RoleRequirements,
    role_statuses: DocumentStatusMap,
    identity_statuses: &DocumentStatusMap,
) -> DocumentStatusMap {
    if !requirements.identity_fallback() {
        return role_statuses;
    }

    let mut merged = role_statuses;
    for doc_type in requirements.accepted() {
        if let Some(status) = identity_statuses.get(&doc_type) {
            merged.entry(doc_type).or_insert(*status);
        }
    }

    merged
}
