use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use marketgate_application::{AssignmentInitiator, CreateAssignmentInput, ResubmissionInput};
use marketgate_core::ActorIdentity;
use marketgate_domain::{AssignmentStatus, RoleAssignmentId};
use uuid::Uuid;

use crate::dto::{
    AssignmentDetailsResponse, CreateRoleAssignmentRequest, CreatedRoleAssignmentResponse,
    ReasonRequest, RegisterRequest, RequirementsResponse, ResubmitRequest, ReviewQueueQuery,
    ReviewRoleAssignmentRequest, RoleAssignmentResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Public self-registration. Creates the account together with its first assignment.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<CreatedRoleAssignmentResponse>)> {
    let input = CreateAssignmentInput::try_from(payload)?;
    let created = state
        .lifecycle_service
        .create_assignment(AssignmentInitiator::SelfRegistration, input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedRoleAssignmentResponse::from(created)),
    ))
}

/// Evidence a role asks for. Unrecognised names get the strictest requirements.
pub async fn role_requirements_handler(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Json<RequirementsResponse> {
    let requirements = state.lifecycle_service.requirements_for_role_name(&role);
    Json(RequirementsResponse::from(&requirements))
}

pub async fn create_role_assignment_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Json(payload): Json<CreateRoleAssignmentRequest>,
) -> ApiResult<(StatusCode, Json<CreatedRoleAssignmentResponse>)> {
    let input = CreateAssignmentInput::try_from(payload)?;
    let created = state
        .lifecycle_service
        .create_assignment(AssignmentInitiator::Actor(&actor), input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedRoleAssignmentResponse::from(created)),
    ))
}

pub async fn review_queue_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Query(query): Query<ReviewQueueQuery>,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    let status = AssignmentStatus::parse(query.status.as_str())?;
    let assignments = state
        .lifecycle_service
        .review_queue(&actor, status)
        .await?
        .into_iter()
        .map(RoleAssignmentResponse::from)
        .collect();

    Ok(Json(assignments))
}

pub async fn role_assignment_details_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<Json<AssignmentDetailsResponse>> {
    let details = state
        .lifecycle_service
        .assignment_details(&actor, RoleAssignmentId::from_uuid(assignment_id))
        .await?;

    Ok(Json(AssignmentDetailsResponse::from(details)))
}

pub async fn review_role_assignment_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(assignment_id): Path<Uuid>,
    payload: Option<Json<ReviewRoleAssignmentRequest>>,
) -> ApiResult<Json<RoleAssignmentResponse>> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    let assignment = state
        .lifecycle_service
        .review_assignment(
            &actor,
            RoleAssignmentId::from_uuid(assignment_id),
            payload.force_active,
        )
        .await?;

    Ok(Json(RoleAssignmentResponse::from(assignment)))
}

pub async fn request_resubmission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<ReasonRequest>,
) -> ApiResult<Json<RoleAssignmentResponse>> {
    let assignment = state
        .lifecycle_service
        .request_resubmission(
            &actor,
            RoleAssignmentId::from_uuid(assignment_id),
            payload.reason.as_str(),
        )
        .await?;

    Ok(Json(RoleAssignmentResponse::from(assignment)))
}

pub async fn revoke_role_assignment_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<ReasonRequest>,
) -> ApiResult<Json<RoleAssignmentResponse>> {
    let assignment = state
        .lifecycle_service
        .revoke(
            &actor,
            RoleAssignmentId::from_uuid(assignment_id),
            payload.reason.as_str(),
        )
        .await?;

    Ok(Json(RoleAssignmentResponse::from(assignment)))
}

pub async fn resubmit_role_assignment_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<ResubmitRequest>,
) -> ApiResult<Json<RoleAssignmentResponse>> {
    let input = ResubmissionInput::try_from(payload)?;
    let assignment = state
        .lifecycle_service
        .resubmit(&actor, RoleAssignmentId::from_uuid(assignment_id), input)
        .await?;

    Ok(Json(RoleAssignmentResponse::from(assignment)))
}
