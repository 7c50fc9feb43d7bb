//! User account projection owned by the role workflow.

use chrono::{DateTime, Utc};
use marketgate_core::{AppError, AppResult, UserId};
use serde::{Deserialize, Serialize};

use crate::LegacyRole;

/// Login eligibility of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// May sign in.
    Active,
    /// Registered, not yet cleared to sign in.
    Inactive,
    /// Blocked by an administrator.
    Suspended,
}

impl AccountStatus {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }

    /// Parses a storage string.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "suspended" => Ok(Self::Suspended),
            _ => Err(AppError::Validation(format!(
                "unknown account status '{value}'"
            ))),
        }
    }
}

/// User record as seen by the role workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// Unique user identifier.
    pub id: UserId,
    /// Name shown to reviewers.
    pub display_name: String,
    /// Contact address, if known.
    pub email: Option<EmailAddress>,
    /// Login eligibility.
    pub status: AccountStatus,
    /// Coarse role mirror for older authorization checks.
    pub legacy_role: Option<LegacyRole>,
    /// Bumped whenever outstanding sessions must be re-authenticated.
    pub session_epoch: i64,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// Creates a freshly registered, not yet active account.
    #[must_use]
    pub fn new_inactive(
        display_name: impl Into<String>,
        email: Option<EmailAddress>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            display_name: display_name.into(),
            email,
            status: AccountStatus::Inactive,
            legacy_role: None,
            session_epoch: 0,
            created_at: now,
        }
    }
}

/// Lower-cased email address with a basic structural check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validates `local@domain.tld` shape and length.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let normalized = value.into().trim().to_lowercase();

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain '@'".to_owned(),
            ));
        };

        if local.is_empty() || domain.contains('@') || !domain.contains('.') {
            return Err(AppError::Validation(format!(
                "'{normalized}' is not a valid email address"
            )));
        }

        if normalized.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}
