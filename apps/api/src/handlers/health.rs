use axum::Json;
use marketgate_domain::REQUIREMENT_POLICY_VERSION;

use crate::dto::HealthResponse;

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        requirement_policy_version: REQUIREMENT_POLICY_VERSION,
    })
}
