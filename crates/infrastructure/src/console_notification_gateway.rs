//! Console notification gateway for development. Logs notifications to tracing output.

use async_trait::async_trait;
use marketgate_application::{Notification, NotificationGateway};
use marketgate_core::AppResult;
use tracing::info;

/// Development notification gateway that logs notifications to the console.
#[derive(Clone)]
pub struct ConsoleNotificationGateway;

impl ConsoleNotificationGateway {
    /// Creates a new console notification gateway.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotificationGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationGateway for ConsoleNotificationGateway {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        info!(
            user_id = %notification.user_id,
            severity = notification.severity.as_str(),
            category = notification.category.as_str(),
            "--- NOTIFICATION (console) ---\n{}\n\n{}\n--- END NOTIFICATION ---",
            notification.title,
            notification.message
        );

        Ok(())
    }
}
