mod cors;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use marketgate_core::AppError;
use marketgate_domain::MAX_DOCUMENT_BYTES;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionManagerLayer;
use tower_sessions_sqlx_store::PostgresStore;

use crate::state::AppState;
use crate::{auth, handlers, middleware};

use self::cors::build_cors_layer;

/// Base64 inflates uploads by a third; a resubmission may carry several documents.
const MAX_REQUEST_BYTES: usize = MAX_DOCUMENT_BYTES * 8;

pub fn build_router(
    app_state: AppState,
    frontend_url: &str,
    session_layer: SessionManagerLayer<PostgresStore>,
) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/api/role-assignments",
            get(handlers::role_assignments::review_queue_handler)
                .post(handlers::role_assignments::create_role_assignment_handler),
        )
        .route(
            "/api/role-assignments/{assignment_id}",
            get(handlers::role_assignments::role_assignment_details_handler),
        )
        .route(
            "/api/role-assignments/{assignment_id}/review",
            post(handlers::role_assignments::review_role_assignment_handler),
        )
        .route(
            "/api/role-assignments/{assignment_id}/request-resubmission",
            post(handlers::role_assignments::request_resubmission_handler),
        )
        .route(
            "/api/role-assignments/{assignment_id}/revoke",
            post(handlers::role_assignments::revoke_role_assignment_handler),
        )
        .route(
            "/api/role-assignments/{assignment_id}/resubmit",
            post(handlers::role_assignments::resubmit_role_assignment_handler),
        )
        .route(
            "/api/documents/{document_id}/approve",
            post(handlers::documents::approve_document_handler),
        )
        .route(
            "/api/documents/{document_id}/reject",
            post(handlers::documents::reject_document_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_auth,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/auth/bootstrap", post(auth::bootstrap_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route(
            "/api/registrations",
            post(handlers::role_assignments::register_handler),
        )
        .route(
            "/api/role-requirements/{role}",
            get(handlers::role_assignments::role_requirements_handler),
        )
        .merge(protected_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(frontend_url)?)
        .layer(session_layer)
        .with_state(app_state))
}
