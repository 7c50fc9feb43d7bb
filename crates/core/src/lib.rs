//! Shared primitives for all Rust crates in Marketgate.

#![forbid(unsafe_code)]

/// Authenticated actor primitives shared across services.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use auth::ActorIdentity;

/// Result type used across Marketgate crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string. Surrounding whitespace is trimmed.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
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

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input: missing file, wrong MIME type or size, empty reason.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller has no session, or the session was invalidated.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Actor lacks the role or scope for the requested transition.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Requested transition is not legal from the current status.
    #[error("invalid state '{current}': {message}")]
    InvalidState {
        /// Storage value of the status observed when the transition was refused.
        current: String,
        /// Human-readable explanation.
        message: String,
    },

    /// Transactional store failure. The whole operation was rolled back.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Best-effort collaborator failure (notifications, sessions, audit).
    #[error("side effect error: {0}")]
    SideEffect(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the status carried by an invalid-state error.
    #[must_use]
    pub fn current_status(&self) -> Option<&str> {
        match self {
            Self::InvalidState { current, .. } => Some(current.as_str()),
            _ => None,
        }
    }
}
