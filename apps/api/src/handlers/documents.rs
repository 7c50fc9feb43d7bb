use axum::Json;
use axum::extract::{Extension, Path, State};
use marketgate_core::ActorIdentity;
use marketgate_domain::DocumentId;
use uuid::Uuid;

use crate::dto::{DocumentReviewResponse, ReasonRequest};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn approve_document_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<DocumentReviewResponse>> {
    let outcome = state
        .lifecycle_service
        .approve_document(&actor, DocumentId::from_uuid(document_id))
        .await?;

    Ok(Json(DocumentReviewResponse::from(outcome)))
}

pub async fn reject_document_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<ReasonRequest>,
) -> ApiResult<Json<DocumentReviewResponse>> {
    let outcome = state
        .lifecycle_service
        .reject_document(
            &actor,
            DocumentId::from_uuid(document_id),
            payload.reason.as_str(),
        )
        .await?;

    Ok(Json(DocumentReviewResponse::from(outcome)))
}
