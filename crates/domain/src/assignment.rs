//! Role assignment aggregate and its lifecycle statuses.

use chrono::{DateTime, Utc};
use marketgate_core::{AppError, AppResult, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Role;
use crate::document::append_line;

/// Unique identifier for a role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleAssignmentId(Uuid);

impl RoleAssignmentId {
    /// Creates a random assignment identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an assignment identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleAssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleAssignmentId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of a market an assignment can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketId(Uuid);

impl MarketId {
    /// Creates a random market identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a market identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MarketId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MarketId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lifecycle status of a role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Requested or granted, nothing reviewed yet.
    Pending,
    /// Documents are being reviewed.
    UnderReview,
    /// Partial privileges while remaining evidence is outstanding.
    ProvisionalActive,
    /// Full privileges.
    Active,
    /// Blocked, eligible for resubmission.
    Rejected,
    /// Administratively withdrawn. Terminal.
    Revoked,
    /// Superseded by an elevated role.
    Inactive,
}

impl AssignmentStatus {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderReview => "under_review",
            Self::ProvisionalActive => "provisional_active",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Revoked => "revoked",
            Self::Inactive => "inactive",
        }
    }

    /// Parses a storage string.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "under_review" => Ok(Self::UnderReview),
            "provisional_active" => Ok(Self::ProvisionalActive),
            "active" => Ok(Self::Active),
            "rejected" => Ok(Self::Rejected),
            "revoked" => Ok(Self::Revoked),
            "inactive" => Ok(Self::Inactive),
            _ => Err(AppError::Validation(format!(
                "unknown assignment status '{value}'"
            ))),
        }
    }

    /// Returns whether authorization checks honor this status.
    #[must_use]
    pub fn is_honored(&self) -> bool {
        matches!(self, Self::Active | Self::ProvisionalActive)
    }

    /// Returns whether an admin may run a review from this status.
    #[must_use]
    pub fn is_reviewable(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::UnderReview | Self::ProvisionalActive | Self::Rejected
        )
    }

    /// Returns whether the assignment can be revoked from this status.
    #[must_use]
    pub fn is_revocable(&self) -> bool {
        matches!(
            self,
            Self::Active | Self::ProvisionalActive | Self::UnderReview
        )
    }

    /// Position on the approval ladder, `None` outside of it.
    #[must_use]
    pub fn ladder_rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::UnderReview => Some(1),
            Self::ProvisionalActive => Some(2),
            Self::Active => Some(3),
            Self::Rejected | Self::Revoked | Self::Inactive => None,
        }
    }

    /// Returns whether moving to `target` goes forward.
    ///
    /// Leaving `rejected` for any ladder status counts as a promotion.
    #[must_use]
    pub fn is_promotion_to(&self, target: Self) -> bool {
        match (self.ladder_rank(), target.ladder_rank()) {
            (Some(current), Some(next)) => next > current,
            (None, Some(_)) => *self == Self::Rejected,
            _ => false,
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Old and new status of one assignment mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Status before the mutation.
    pub from: AssignmentStatus,
    /// Status after the mutation.
    pub to: AssignmentStatus,
}

impl StatusChange {
    /// Returns whether the status actually changed.
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }

    /// Returns whether the status changed while either side is honored.
    ///
    /// Covers moves into and out of the honored set as well as moves within
    /// it, such as `provisional_active -> active`.
    #[must_use]
    pub fn touches_honored_set(&self) -> bool {
        self.is_change() && (self.from.is_honored() || self.to.is_honored())
    }

    /// Returns whether the assignment newly reached full activation.
    #[must_use]
    pub fn newly_active(&self) -> bool {
        self.to == AssignmentStatus::Active && self.from != AssignmentStatus::Active
    }
}

/// The `(user, role)` aggregate root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Stable identifier.
    pub id: RoleAssignmentId,
    /// Holder of the role.
    pub user_id: UserId,
    /// Role held.
    pub role: Role,
    /// Market scope for field roles, if any.
    pub market_id: Option<MarketId>,
    /// Current lifecycle status.
    pub status: AssignmentStatus,
    /// Append-only reviewer trail.
    pub admin_notes: String,
    /// Explicit invitation to resubmit documents.
    pub resubmission_reason: Option<String>,
    /// Actor that created or re-requested the assignment.
    pub assigned_by: Option<UserId>,
    /// Last reviewer.
    pub reviewed_by: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Last review time.
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl RoleAssignment {
    /// Creates a fresh assignment in `pending`.
    #[must_use]
    pub fn new_pending(
        user_id: UserId,
        role: Role,
        market_id: Option<MarketId>,
        assigned_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RoleAssignmentId::new(),
            user_id,
            role,
            market_id,
            status: AssignmentStatus::Pending,
            admin_notes: String::new(),
            resubmission_reason: None,
            assigned_by,
            reviewed_by: None,
            created_at: now,
            updated_at: now,
            reviewed_at: None,
        }
    }

    /// Appends one timestamped line to the notes trail.
    pub fn append_note(&mut self, note: &str, now: DateTime<Utc>) {
        append_line(&mut self.admin_notes, now, note);
        self.updated_at = now;
    }

    /// Moves to `status` and reports the change.
    pub fn transition_to(&mut self, status: AssignmentStatus, now: DateTime<Utc>) -> StatusChange {
        let change = StatusChange {
            from: self.status,
            to: status,
        };
        self.status = status;
        self.updated_at = now;
        change
    }

    /// Stamps reviewer identity and time.
    pub fn mark_reviewed(&mut self, reviewer: UserId, now: DateTime<Utc>) {
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        self.updated_at = now;
    }

    /// Returns an invalid-state error carrying the current status.
    #[must_use]
    pub fn invalid_state(&self, message: impl Into<String>) -> AppError {
        AppError::InvalidState {
            current: self.status.as_str().to_owned(),
            message: message.into(),
        }
    }
}
