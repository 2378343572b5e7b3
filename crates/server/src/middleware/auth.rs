//! Authentication extractors.
//!
//! The logged-in user lives in the session under
//! [`session_keys::CURRENT_USER`]. Rejections are [`AppError`]s so they
//! render as the standard envelope.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::{Session, session};
use tracing::warn;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};

/// Extractor that requires a logged-in user of any role.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_cart(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Please log in".to_string()))
    }
}

/// Extractor that requires a logged-in `ADMIN`.
///
/// Anonymous requests get 401, customers get 403.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(Self(user))
    }
}

async fn current_user(parts: &Parts) -> Result<Option<CurrentUser>, AppError> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

    logged_in_user(session.get::<CurrentUser>(session_keys::CURRENT_USER).await)
}

/// A session whose user entry fails to deserialize counts as logged out.
/// Store failures are server errors.
fn logged_in_user(
    lookup: Result<Option<CurrentUser>, session::Error>,
) -> Result<Option<CurrentUser>, AppError> {
    match lookup {
        Ok(user) => Ok(user),
        Err(session::Error::SerdeJson(e)) => {
            warn!(error = %e, "Discarding unreadable session user");
            Ok(None)
        }
        Err(e) => Err(AppError::Session(e)),
    }
}

/// Helper to set the current user in the session.
///
/// Cycles the session id first so a pre-login id can't be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to clear the session on logout.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use tower_sessions::session_store;

    use super::*;

    #[test]
    fn test_unreadable_session_user_is_logged_out() {
        let err = serde_json::from_str::<CurrentUser>("not json").unwrap_err();

        let user = logged_in_user(Err(session::Error::SerdeJson(err))).unwrap();

        assert!(user.is_none());
    }

    #[test]
    fn test_store_failure_is_a_server_error() {
        let err = session_store::Error::Backend("connection refused".to_string());

        let rejection = logged_in_user(Err(session::Error::Store(err))).unwrap_err();

        assert!(matches!(rejection, AppError::Session(_)));
        assert_eq!(
            rejection.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
