//! Admin account management.
//!
//! Self-service registration only ever creates customers; this is how the
//! first admin gets in.

use thiserror::Error;

use etuckshop_server::services::{AuthError, AuthService};

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Validation or storage failure from the auth service.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create an admin account. An existing account with the same email is
/// promoted to admin and its password reset.
///
/// Returns the account's ID.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<i32, AdminError> {
    let pool = connect().await?;

    tracing::info!("Provisioning admin account: {email}");
    let user = AuthService::new(&pool)
        .provision_admin(name, email, password)
        .await?;

    tracing::info!(
        "Admin account ready! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );

    Ok(user.id.as_i32())
}
