use std::sync::Arc;

use marketgate_application::{AssignmentLifecycleService, RoleAssignmentRepository, SessionStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle_service: AssignmentLifecycleService,
    pub repository: Arc<dyn RoleAssignmentRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub frontend_url: String,
    pub bootstrap_token: String,
}
