use axum::Json;
use axum::extract::State;
use marketgate_core::{ActorIdentity, AppError, UserId};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::dto::ActorResponse;
use crate::error::ApiResult;
use crate::state::AppState;

use super::{SESSION_ACTOR_KEY, SESSION_CREATED_AT_KEY};

#[derive(Debug, Deserialize)]
pub struct BootstrapRequest {
    pub user_id: Uuid,
    pub token: String,
}

/// Opens a session for an existing user when the shared bootstrap token matches.
///
/// The session records the user's current epoch so a later invalidation
/// turns it stale, and is registered so it can be deleted server side.
pub async fn bootstrap_handler(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<BootstrapRequest>,
) -> ApiResult<Json<ActorResponse>> {
    if !token_matches(&payload.token, &state.bootstrap_token) {
        return Err(AppError::Unauthenticated("invalid bootstrap token".to_owned()).into());
    }

    let user_id = UserId::from_uuid(payload.user_id);
    let user = state
        .repository
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;
    let session_epoch = state.sessions.current_epoch(user.id).await?;
    let identity = ActorIdentity::new(user.id, user.display_name.clone(), session_epoch);

    session
        .cycle_id()
        .await
        .map_err(|error| AppError::Internal(format!("failed to cycle session id: {error}")))?;

    session
        .insert(SESSION_ACTOR_KEY, &identity)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist session identity: {error}"))
        })?;

    session
        .insert(SESSION_CREATED_AT_KEY, chrono::Utc::now().timestamp())
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist session creation time: {error}"))
        })?;

    session
        .save()
        .await
        .map_err(|error| AppError::Internal(format!("failed to save session: {error}")))?;

    let session_id = session
        .id()
        .ok_or_else(|| AppError::Internal("session has no id after save".to_owned()))?;
    state
        .sessions
        .register_session(session_id.to_string().as_str(), user.id)
        .await?;

    info!(user_id = %user.id, session_epoch, "session bootstrapped");

    let roles = state.lifecycle_service.honored_roles(user.id).await?;
    Ok(Json(ActorResponse::new(&identity, roles)))
}

/// Compares fixed-length digests without short-circuiting on the first difference.
fn token_matches(candidate: &str, expected: &str) -> bool {
    let candidate = Sha256::digest(candidate.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    candidate
        .iter()
        .zip(expected.iter())
        .fold(0_u8, |difference, (left, right)| difference | (left ^ right))
        == 0
}
