use async_trait::async_trait;
use marketgate_core::{AppResult, UserId};
use marketgate_domain::AuditAction;

/// Immutable audit event emitted after a committed role workflow mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Actor that performed the action, `None` for self-registration.
    pub actor_id: Option<UserId>,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Entity type label.
    pub entity_type: String,
    /// Entity identifier.
    pub entity_id: String,
    /// Value before the mutation.
    pub from_value: Option<String>,
    /// Value after the mutation.
    pub to_value: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one audit event.
    async fn record(&self, event: AuditEvent) -> AppResult<()>;
}
