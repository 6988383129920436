//! PostgreSQL store for identity-service.
//!
//! Uses sqlx runtime queries; each method is one statement except invitation
//! acceptance, which runs in a transaction.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use super::error::ServiceError;
use super::store::{CredentialStore, TokenStore};
use crate::models::{
    Invitation, InvitationState, NewInvitation, NewOrganization, NewUser, Organization,
    TokenRecord, User,
};

const USER_COLUMNS: &str = "user_id, username, email, password_hash, created_utc";
const ORG_COLUMNS: &str = "org_id, org_name, org_description, owner_user_id, created_utc";
const INVITATION_COLUMNS: &str = "invitation_id, org_id, invited_user_id, invited_by_user_id, \
                                  invitation_state_code, created_utc, accepted_utc";
const TOKEN_COLUMNS: &str = "user_id, access_token, refresh_token, active_flag, created_utc";

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl CredentialStore for Database {
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::from(e)
            })?;
        Ok(())
    }

    // ==================== User Operations ====================

    async fn insert_user(&self, user: NewUser) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.password_hash.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::EmailAlreadyRegistered
            } else {
                ServiceError::from(e)
            }
        })
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY user_id"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<(), ServiceError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE user_id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }

    // ==================== Organization Operations ====================

    async fn insert_organization(
        &self,
        org: NewOrganization,
    ) -> Result<Organization, ServiceError> {
        Ok(sqlx::query_as::<_, Organization>(&format!(
            "INSERT INTO organizations (org_name, org_description, owner_user_id) \
             VALUES ($1, $2, $3) RETURNING {ORG_COLUMNS}"
        ))
        .bind(&org.org_name)
        .bind(&org.org_description)
        .bind(org.owner_user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_organization(&self, org_id: i64) -> Result<Option<Organization>, ServiceError> {
        Ok(sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations WHERE org_id = $1"
        ))
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, ServiceError> {
        Ok(sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations ORDER BY org_id"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_owned_organization(
        &self,
        org_id: i64,
        owner_user_id: i64,
        org_name: &str,
        org_description: Option<&str>,
    ) -> Result<Option<Organization>, ServiceError> {
        Ok(sqlx::query_as::<_, Organization>(&format!(
            "UPDATE organizations SET org_name = $3, org_description = $4 \
             WHERE org_id = $1 AND owner_user_id = $2 RETURNING {ORG_COLUMNS}"
        ))
        .bind(org_id)
        .bind(owner_user_id)
        .bind(org_name)
        .bind(org_description)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_owned_organization(
        &self,
        org_id: i64,
        owner_user_id: i64,
    ) -> Result<bool, ServiceError> {
        let result =
            sqlx::query("DELETE FROM organizations WHERE org_id = $1 AND owner_user_id = $2")
                .bind(org_id)
                .bind(owner_user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Membership Operations ====================

    async fn list_members(&self, org_id: i64) -> Result<Vec<User>, ServiceError> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            SELECT u.user_id, u.username, u.email, u.password_hash, u.created_utc
            FROM users u
            JOIN organization_membership m ON m.user_id = u.user_id
            WHERE m.org_id = $1
            ORDER BY m.joined_utc, u.user_id
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn is_member(&self, org_id: i64, user_id: i64) -> Result<bool, ServiceError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM organization_membership WHERE org_id = $1 AND user_id = $2)",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    // ==================== Invitation Operations ====================

    async fn insert_invitation(
        &self,
        invitation: NewInvitation,
    ) -> Result<Invitation, ServiceError> {
        sqlx::query_as::<_, Invitation>(&format!(
            "INSERT INTO organization_invitations \
             (org_id, invited_user_id, invited_by_user_id, invitation_state_code) \
             VALUES ($1, $2, $3, $4) RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(invitation.org_id)
        .bind(invitation.invited_user_id)
        .bind(invitation.invited_by_user_id)
        .bind(InvitationState::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::InvitationAlreadyPending
            } else {
                ServiceError::from(e)
            }
        })
    }

    async fn find_pending_invitation(
        &self,
        org_id: i64,
        user_id: i64,
    ) -> Result<Option<Invitation>, ServiceError> {
        Ok(sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM organization_invitations \
             WHERE org_id = $1 AND invited_user_id = $2 AND invitation_state_code = $3"
        ))
        .bind(org_id)
        .bind(user_id)
        .bind(InvitationState::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_pending_invitations(
        &self,
        user_id: i64,
    ) -> Result<Vec<Invitation>, ServiceError> {
        Ok(sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM organization_invitations \
             WHERE invited_user_id = $1 AND invitation_state_code = $2 \
             ORDER BY invitation_id"
        ))
        .bind(user_id)
        .bind(InvitationState::Pending.as_str())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn accept_invitation(
        &self,
        invitation_id: i64,
    ) -> Result<Option<Invitation>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let accepted = sqlx::query_as::<_, Invitation>(&format!(
            "UPDATE organization_invitations \
             SET invitation_state_code = $2, accepted_utc = now() \
             WHERE invitation_id = $1 AND invitation_state_code = $3 \
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(invitation_id)
        .bind(InvitationState::Accepted.as_str())
        .bind(InvitationState::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(invitation) = accepted else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO organization_membership (user_id, org_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(invitation.invited_user_id)
        .bind(invitation.org_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(invitation))
    }
}

#[async_trait]
impl TokenStore for Database {
    async fn persist_tokens(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<TokenRecord, ServiceError> {
        Ok(sqlx::query_as::<_, TokenRecord>(&format!(
            "INSERT INTO token (access_token, user_id, refresh_token, active_flag) \
             VALUES ($1, $2, $3, TRUE) RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(access_token)
        .bind(user_id)
        .bind(refresh_token)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_for_rotation(
        &self,
        user_id: i64,
        refresh_token: &str,
    ) -> Result<Option<TokenRecord>, ServiceError> {
        Ok(sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM token \
             WHERE user_id = $1 AND refresh_token = $2 AND active_flag LIMIT 1"
        ))
        .bind(user_id)
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn rotate_tokens(
        &self,
        record: &TokenRecord,
        new_access_token: &str,
        new_refresh_token: &str,
    ) -> Result<TokenRecord, ServiceError> {
        // The refresh token in the WHERE clause is the compare-and-swap guard.
        sqlx::query_as::<_, TokenRecord>(&format!(
            "UPDATE token SET access_token = $1, refresh_token = $2 \
             WHERE access_token = $3 AND user_id = $4 AND refresh_token = $5 \
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(new_access_token)
        .bind(new_refresh_token)
        .bind(&record.access_token)
        .bind(record.user_id)
        .bind(&record.refresh_token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::RotationConflict)
    }
}
