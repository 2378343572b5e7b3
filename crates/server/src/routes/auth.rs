//! Account route handlers.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::extract::Json;
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::response::{ApiResponse, ApiResult};
use crate::services::AuthService;
use crate::state::AppState;

/// Registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create a customer account and log it in.
///
/// POST /auth/register
///
/// # Errors
///
/// Returns 400 for invalid input and 409 if the email is taken.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RegisterRequest>,
) -> Result<(StatusCode, ApiResponse<CurrentUser>)> {
    let user = AuthService::new(state.pool())
        .register(&form.name, &form.email, &form.password)
        .await?;

    let current = CurrentUser::from(&user);
    set_current_user(&session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    tracing::info!(user_id = %current.id, "Customer registered");
    Ok(ApiResponse::with_message(current, "Account created").created())
}

/// Log in with email and password.
///
/// POST /auth/login
///
/// # Errors
///
/// Returns 401 for a wrong email or password.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginRequest>,
) -> ApiResult<CurrentUser> {
    let user = AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await?;

    let current = CurrentUser::from(&user);
    set_current_user(&session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    Ok(ApiResponse::with_message(current, "Logged in"))
}

/// End the session.
///
/// POST /auth/logout
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn logout(session: Session) -> ApiResult<()> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(ApiResponse::message("Logged out"))
}

/// The logged-in user.
///
/// GET /auth/me
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn me(RequireAuth(user): RequireAuth) -> ApiResult<CurrentUser> {
    Ok(ApiResponse::ok(user))
}
