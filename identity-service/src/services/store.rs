//! Storage contracts.
//!
//! Every write is a single atomic unit. `Database` implements these on
//! Postgres, `InMemoryStore` in process.

use async_trait::async_trait;

use super::error::ServiceError;
use crate::models::{
    Invitation, NewInvitation, NewOrganization, NewUser, Organization, TokenRecord, User,
};

/// Users, organizations, membership and invitations.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    // ==================== Users ====================

    /// Insert a user. Fails `EmailAlreadyRegistered` if the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, ServiceError>;

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError>;

    /// Lookup by normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    async fn list_users(&self) -> Result<Vec<User>, ServiceError>;

    async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<(), ServiceError>;

    // ==================== Organizations ====================

    async fn insert_organization(
        &self,
        org: NewOrganization,
    ) -> Result<Organization, ServiceError>;

    async fn find_organization(&self, org_id: i64) -> Result<Option<Organization>, ServiceError>;

    async fn list_organizations(&self) -> Result<Vec<Organization>, ServiceError>;

    /// Update name and description if `owner_user_id` owns the organization.
    /// `None` covers both "missing" and "not owned".
    async fn update_owned_organization(
        &self,
        org_id: i64,
        owner_user_id: i64,
        org_name: &str,
        org_description: Option<&str>,
    ) -> Result<Option<Organization>, ServiceError>;

    /// Delete if owned; returns whether a row was removed. Membership and
    /// invitations go with it.
    async fn delete_owned_organization(
        &self,
        org_id: i64,
        owner_user_id: i64,
    ) -> Result<bool, ServiceError>;

    // ==================== Membership ====================

    async fn list_members(&self, org_id: i64) -> Result<Vec<User>, ServiceError>;

    async fn is_member(&self, org_id: i64, user_id: i64) -> Result<bool, ServiceError>;

    // ==================== Invitations ====================

    /// Record a pending invitation. Fails `InvitationAlreadyPending` if one exists.
    async fn insert_invitation(&self, invitation: NewInvitation)
        -> Result<Invitation, ServiceError>;

    async fn find_pending_invitation(
        &self,
        org_id: i64,
        user_id: i64,
    ) -> Result<Option<Invitation>, ServiceError>;

    async fn list_pending_invitations(&self, user_id: i64)
        -> Result<Vec<Invitation>, ServiceError>;

    /// Mark a pending invitation accepted and add the membership row, together.
    /// `None` if the invitation is no longer pending.
    async fn accept_invitation(
        &self,
        invitation_id: i64,
    ) -> Result<Option<Invitation>, ServiceError>;
}

/// Persisted access/refresh pairs.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a new active record. Prior records for the user are left alone.
    async fn persist_tokens(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<TokenRecord, ServiceError>;

    async fn find_for_rotation(
        &self,
        user_id: i64,
        refresh_token: &str,
    ) -> Result<Option<TokenRecord>, ServiceError>;

    /// Replace both token values on `record`, only if its stored refresh token
    /// still equals `record.refresh_token`. Fails `RotationConflict` otherwise.
    /// Status and creation time are untouched.
    async fn rotate_tokens(
        &self,
        record: &TokenRecord,
        new_access_token: &str,
        new_refresh_token: &str,
    ) -> Result<TokenRecord, ServiceError>;
}
