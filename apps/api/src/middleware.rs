use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use marketgate_application::SessionStore;
use marketgate_core::{ActorIdentity, AppError, AppResult};
use tower_sessions::Session;
use tracing::warn;

use crate::auth::SESSION_ACTOR_KEY;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = session
        .get::<ActorIdentity>(SESSION_ACTOR_KEY)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to read session identity: {error}"))
        })?;
    let had_identity = identity.is_some();

    let actor = match authenticate(identity, state.sessions.as_ref()).await {
        Ok(actor) => actor,
        Err(error) => {
            if had_identity && matches!(error, AppError::Unauthenticated(_)) {
                if let Err(flush_error) = session.flush().await {
                    warn!(error = %flush_error, "failed to flush stale session");
                }
            }
            return Err(error.into());
        }
    };

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Accepts a session identity only while its epoch matches the user's current one.
pub async fn authenticate(
    identity: Option<ActorIdentity>,
    sessions: &dyn SessionStore,
) -> AppResult<ActorIdentity> {
    let identity = identity
        .ok_or_else(|| AppError::Unauthenticated("authentication required".to_owned()))?;

    let current_epoch = sessions
        .current_epoch(identity.user_id())
        .await
        .map_err(|error| match error {
            AppError::NotFound(_) => {
                AppError::Unauthenticated("session user no longer exists".to_owned())
            }
            other => other,
        })?;

    if identity.session_epoch() != current_epoch {
        return Err(AppError::Unauthenticated(
            "session was invalidated, sign in again".to_owned(),
        ));
    }

    Ok(identity)
}

pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if is_state_changing_method(request.method())
        && !is_trusted_origin(request.headers(), state.frontend_url.as_str())
    {
        return Err(AppError::Authorization("cross-origin request blocked".to_owned()).into());
    }

    Ok(next.run(request).await)
}

fn is_trusted_origin(headers: &HeaderMap, allowed_origin: &str) -> bool {
    if headers.get("sec-fetch-site") == Some(&HeaderValue::from_static("cross-site")) {
        return false;
    }

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let referer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    origin == allowed_origin || referer.starts_with(allowed_origin)
}

fn is_state_changing_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, Method, header};
    use chrono::Utc;
    use marketgate_application::SessionStore;
    use marketgate_core::{ActorIdentity, AppError};
    use marketgate_domain::UserAccount;
    use marketgate_infrastructure::InMemoryRoleAssignmentStore;

    use super::{authenticate, is_state_changing_method, is_trusted_origin};

    #[tokio::test]
    async fn missing_identity_is_unauthenticated() {
        let store = InMemoryRoleAssignmentStore::new();
        let result = authenticate(None, &store).await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn bumped_epoch_turns_session_stale() {
        let store = InMemoryRoleAssignmentStore::new();
        let user = UserAccount::new_inactive("Fish Stall", None, Utc::now());
        let user_id = user.id;
        store.seed_user(user).await;

        let identity = ActorIdentity::new(user_id, "Fish Stall", 0);
        assert!(authenticate(Some(identity.clone()), &store).await.is_ok());

        assert_eq!(store.bump_epoch(user_id).await.ok(), Some(1));
        let result = authenticate(Some(identity), &store).await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));

        let refreshed = ActorIdentity::new(user_id, "Fish Stall", 1);
        assert!(authenticate(Some(refreshed), &store).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_user_is_unauthenticated() {
        let store = InMemoryRoleAssignmentStore::new();
        let identity = ActorIdentity::new(marketgate_core::UserId::new(), "Ghost", 0);
        let result = authenticate(Some(identity), &store).await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn origin_check_accepts_frontend_and_rejects_cross_site() {
        let frontend = "http://localhost:3000";

        let mut same_origin = HeaderMap::new();
        same_origin.insert(header::ORIGIN, HeaderValue::from_static(frontend));
        assert!(is_trusted_origin(&same_origin, frontend));

        let mut referer_only = HeaderMap::new();
        referer_only.insert(
            header::REFERER,
            HeaderValue::from_static("http://localhost:3000/review"),
        );
        assert!(is_trusted_origin(&referer_only, frontend));

        let mut cross_site = same_origin.clone();
        cross_site.insert("sec-fetch-site", HeaderValue::from_static("cross-site"));
        assert!(!is_trusted_origin(&cross_site, frontend));

        assert!(!is_trusted_origin(&HeaderMap::new(), frontend));
    }

    #[test]
    fn only_mutations_are_origin_checked() {
        assert!(is_state_changing_method(&Method::POST));
        assert!(!is_state_changing_method(&Method::GET));
    }
}
