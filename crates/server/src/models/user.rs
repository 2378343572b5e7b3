//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use etuckshop_core::{Email, Role, UserId};

/// A tuckshop account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email (unique, lowercased).
    pub email: Email,
    /// Customer or admin.
    pub role: Role,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
