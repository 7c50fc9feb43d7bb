use std::str::FromStr;

use marketgate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Privilege tier a user account can hold through a role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Base role granted to every registered stall vendor.
    Vendor,
    /// Manages one or more markets and their field staff.
    MarketManager,
    /// Field role handling collections and receipts.
    Accountant,
    /// Field role handling stall inspections.
    Inspector,
    /// Administrative role with unrestricted scope.
    SuperAdmin,
}

impl Role {
    /// Returns the stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::MarketManager => "market_manager",
            Self::Accountant => "accountant",
            Self::Inspector => "inspector",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Returns all known roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Role] = &[
            Role::Vendor,
            Role::MarketManager,
            Role::Accountant,
            Role::Inspector,
            Role::SuperAdmin,
        ];

        ALL
    }

    /// Returns whether the role sits above the vendor tier.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        !matches!(self, Self::Vendor)
    }

    /// Returns whether the role is a field role a market manager may staff.
    #[must_use]
    pub fn is_field_role(&self) -> bool {
        matches!(self, Self::Accountant | Self::Inspector)
    }

    /// Returns the coarse bucket mirrored onto the user record.
    #[must_use]
    pub fn legacy_bucket(&self) -> LegacyRole {
        if self.is_elevated() {
            LegacyRole::Admin
        } else {
            LegacyRole::Vendor
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    /// Parses a role name, mapping administrative aliases onto `super_admin`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "vendor" => Ok(Self::Vendor),
            "market_manager" | "manager" => Ok(Self::MarketManager),
            "accountant" => Ok(Self::Accountant),
            "inspector" => Ok(Self::Inspector),
            "super_admin" | "superadmin" | "admin" | "administrator" | "system_admin" => {
                Ok(Self::SuperAdmin)
            }
            _ => Err(AppError::Validation(format!("unknown role '{value}'"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Single coarse role kept on the user record for older authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyRole {
    /// Plain vendor account.
    Vendor,
    /// Any elevated staff account.
    Admin,
}

impl LegacyRole {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Admin => "admin",
        }
    }

    /// Parses a storage string into a legacy role.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!(
                "unknown legacy role '{value}'"
            ))),
        }
    }
}
