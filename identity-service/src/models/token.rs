//! Token record model - one row per sign-in, rewritten on rotation.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Persisted access/refresh pair. `access_token` is the row key.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TokenRecord {
    pub user_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub active_flag: bool,
    pub created_utc: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(user_id: i64, access_token: String, refresh_token: String) -> Self {
        Self {
            user_id,
            access_token,
            refresh_token,
            active_flag: true,
            created_utc: Utc::now(),
        }
    }
}
