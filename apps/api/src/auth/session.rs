use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use marketgate_core::{ActorIdentity, AppError};
use tower_sessions::Session;

use crate::dto::ActorResponse;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn logout_handler(session: Session) -> ApiResult<StatusCode> {
    session
        .delete()
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete session: {error}")))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
) -> ApiResult<Json<ActorResponse>> {
    let roles = state.lifecycle_service.honored_roles(actor.user_id()).await?;

    Ok(Json(ActorResponse::new(&actor, roles)))
}
