//! Role to document-requirement table.
//!
//! Both the admin review path and the document-event path read requirements
//! from the same [`RoleRequirementPolicy`] value, so they cannot drift apart.

use std::str::FromStr;

use marketgate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{DocumentType, Role};

/// Version of the requirement table. Bump when any row changes.
pub const REQUIREMENT_POLICY_VERSION: u16 = 1;

/// Aggregation rule over required document statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Every required type must be approved.
    All,
    /// Any approved identity-class document is enough.
    Either,
}

/// Evidence demanded from vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorEvidence {
    /// An identity document only; a permit is optional.
    #[default]
    IdOnly,
    /// Both an identity document and a permit.
    IdAndPermit,
}

impl VendorEvidence {
    /// Parses the configuration value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim() {
            "id" | "id_only" => Ok(Self::IdOnly),
            "id_and_permit" => Ok(Self::IdAndPermit),
            other => Err(AppError::Validation(format!(
                "vendor evidence must be 'id' or 'id_and_permit', got '{other}'"
            ))),
        }
    }
}

/// Document requirements for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirements {
    required: Vec<DocumentType>,
    optional: Vec<DocumentType>,
    combinator: Combinator,
    identity_fallback: bool,
}

impl RoleRequirements {
    /// Creates a requirement row.
    #[must_use]
    pub fn new(
        required: Vec<DocumentType>,
        optional: Vec<DocumentType>,
        combinator: Combinator,
        identity_fallback: bool,
    ) -> Self {
        Self {
            required,
            optional,
            combinator,
            identity_fallback,
        }
    }

    /// Returns the load-bearing document types.
    #[must_use]
    pub fn required(&self) -> &[DocumentType] {
        self.required.as_slice()
    }

    /// Returns document types accepted but not counted under `All`.
    #[must_use]
    pub fn optional(&self) -> &[DocumentType] {
        self.optional.as_slice()
    }

    /// Returns the aggregation rule.
    #[must_use]
    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    /// Returns whether user-level identity documents may fill missing types.
    #[must_use]
    pub fn identity_fallback(&self) -> bool {
        self.identity_fallback
    }

    /// Returns required and optional types, required first.
    pub fn accepted(&self) -> impl Iterator<Item = DocumentType> + '_ {
        self.required.iter().chain(self.optional.iter()).copied()
    }
}

/// Injectable requirement table shared by every status computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleRequirementPolicy {
    vendor_evidence: VendorEvidence,
}

impl RoleRequirementPolicy {
    /// Creates the table with the configured vendor variant.
    #[must_use]
    pub fn new(vendor_evidence: VendorEvidence) -> Self {
        Self { vendor_evidence }
    }

    /// Returns the vendor variant in effect.
    #[must_use]
    pub fn vendor_evidence(&self) -> VendorEvidence {
        self.vendor_evidence
    }

    /// Returns the requirements for a known role.
    #[must_use]
    pub fn requirements_for(&self, role: Role) -> RoleRequirements {
        match role {
            Role::MarketManager | Role::SuperAdmin => RoleRequirements::new(
                vec![DocumentType::Permit],
                vec![DocumentType::Id],
                Combinator::All,
                false,
            ),
            Role::Vendor => match self.vendor_evidence {
                VendorEvidence::IdOnly => RoleRequirements::new(
                    vec![DocumentType::Id],
                    vec![DocumentType::Permit],
                    Combinator::All,
                    false,
                ),
                VendorEvidence::IdAndPermit => RoleRequirements::new(
                    vec![DocumentType::Id, DocumentType::Permit],
                    Vec::new(),
                    Combinator::All,
                    false,
                ),
            },
            Role::Inspector | Role::Accountant => RoleRequirements::new(
                vec![DocumentType::Id],
                vec![DocumentType::Permit],
                Combinator::Either,
                true,
            ),
        }
    }

    /// Returns the requirements for a raw, unvalidated role name.
    ///
    /// Entry point for callers that hold a name rather than a [`Role`].
    /// Unknown names fail safe by demanding the most evidence.
    #[must_use]
    pub fn requirements_for_name(&self, role_name: &str) -> RoleRequirements {
        match Role::from_str(role_name) {
            Ok(role) => self.requirements_for(role),
            Err(_) => RoleRequirements::new(
                vec![DocumentType::Id, DocumentType::Permit],
                Vec::new(),
                Combinator::All,
                false,
            ),
        }
    }
}
