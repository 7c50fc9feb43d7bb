use async_trait::async_trait;
use marketgate_core::{AppResult, UserId};
use marketgate_domain::MarketId;

/// Visual weight of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSeverity {
    /// Neutral information.
    Info,
    /// Positive outcome.
    Success,
    /// Action needed from the user.
    Warning,
    /// Negative outcome.
    Error,
}

impl NotificationSeverity {
    /// Returns the storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Grouping used by notification inboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    /// Role assignment status updates.
    RoleAssignment,
    /// Document review outcomes.
    Document,
}

impl NotificationCategory {
    /// Returns the storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleAssignment => "role_assignment",
            Self::Document => "document",
        }
    }
}

/// Message delivered to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Recipient.
    pub user_id: UserId,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Visual weight.
    pub severity: NotificationSeverity,
    /// Inbox grouping.
    pub category: NotificationCategory,
}

/// Port for delivering user notifications.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Delivers one notification.
    async fn notify(&self, notification: Notification) -> AppResult<()>;
}

/// Port over the session store used for forced re-authentication.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Records that a session belongs to a user.
    async fn register_session(&self, session_id: &str, user_id: UserId) -> AppResult<()>;

    /// Deletes every live session of a user.
    async fn invalidate_all(&self, user_id: UserId) -> AppResult<()>;

    /// Increments the user's session epoch and returns the new value.
    async fn bump_epoch(&self, user_id: UserId) -> AppResult<i64>;

    /// Returns the user's current session epoch.
    async fn current_epoch(&self, user_id: UserId) -> AppResult<i64>;
}

/// Port answering market scope questions.
#[async_trait]
pub trait MarketDirectory: Send + Sync {
    /// Returns whether the user manages the market.
    async fn is_market_manager(&self, user_id: UserId, market_id: MarketId) -> AppResult<bool>;

    /// Lists markets the user manages.
    async fn markets_managed_by(&self, user_id: UserId) -> AppResult<Vec<MarketId>>;
}
