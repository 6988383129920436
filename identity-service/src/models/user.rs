//! User model - identity records keyed by email.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::utils::PasswordHashString;

/// User entity as persisted.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_utc: DateTime<Utc>,
}

impl User {
    pub fn password_hash(&self) -> PasswordHashString {
        PasswordHashString::new(self.password_hash.clone())
    }

    /// Convert to sanitized response (no password hash).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// Fields required to create a user; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHashString,
}

/// User response for API (without sensitive fields).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = 1)]
    pub user_id: i64,
    #[schema(example = "alice")]
    pub username: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            username: u.username,
            email: u.email,
        }
    }
}

/// Canonical form of an email used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
