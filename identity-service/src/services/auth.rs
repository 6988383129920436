//! Registration, sign-in, token rotation and password changes.

use chrono::Utc;
use std::sync::Arc;

use super::error::{trimmed_required, ServiceError};
use super::jwt::{JwtService, TokenKind, TokenPair};
use super::store::{CredentialStore, TokenStore};
use crate::models::{normalize_email, NewUser, User};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenStore>,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenStore>,
        jwt: JwtService,
    ) -> Self {
        Self { users, tokens, jwt }
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: Password,
    ) -> Result<User, ServiceError> {
        let username = trimmed_required("Username", username)?;
        let email = normalize_email(email);

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let password_hash = hash_in_background(password).await?;

        // The store re-checks uniqueness, so a concurrent duplicate still fails here.
        let user = self
            .users
            .insert_user(NewUser {
                username: username.to_string(),
                email,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = user.user_id, "User registered");
        Ok(user)
    }

    /// Verify credentials and persist a new token record.
    pub async fn sign_in(&self, email: &str, password: Password) -> Result<TokenPair, ServiceError> {
        let user = self
            .users
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !verify_in_background(password, user.password_hash()).await? {
            tracing::info!(user_id = user.user_id, "Sign-in rejected");
            return Err(ServiceError::InvalidCredentials);
        }

        let pair = self.jwt.issue_pair(user.user_id, Utc::now())?;
        self.tokens
            .persist_tokens(user.user_id, &pair.access_token, &pair.refresh_token)
            .await?;

        tracing::info!(user_id = user.user_id, "User signed in");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, rewriting its record in place.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let verified = self.jwt.decode(refresh_token, TokenKind::Refresh)?;

        let record = self
            .tokens
            .find_for_rotation(verified.user_id, refresh_token)
            .await?
            .ok_or_else(|| {
                tracing::info!(user_id = verified.user_id, "Refresh token not on record");
                ServiceError::RefreshTokenNotFound
            })?;

        let pair = self.jwt.issue_pair(verified.user_id, Utc::now())?;
        self.tokens
            .rotate_tokens(&record, &pair.access_token, &pair.refresh_token)
            .await
            .inspect_err(|e| {
                if matches!(e, ServiceError::RotationConflict) {
                    tracing::warn!(user_id = verified.user_id, "Concurrent refresh lost the race");
                }
            })?;

        tracing::info!(user_id = verified.user_id, "Token pair rotated");
        Ok(pair)
    }

    /// Replace the password after re-checking the current one. Outstanding
    /// tokens stay valid.
    pub async fn change_password(
        &self,
        user: &User,
        current_password: Password,
        new_password: Password,
    ) -> Result<(), ServiceError> {
        if !verify_in_background(current_password, user.password_hash()).await? {
            return Err(ServiceError::InvalidCredentials);
        }

        let new_hash = hash_in_background(new_password).await?;
        self.users
            .update_password_hash(user.user_id, new_hash.as_str())
            .await?;

        tracing::info!(user_id = user.user_id, "Password changed");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        self.users.list_users().await
    }
}

async fn hash_in_background(password: Password) -> Result<PasswordHashString, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing task failed: {}", e)))?
        .map_err(ServiceError::Internal)
}

async fn verify_in_background(
    password: Password,
    password_hash: PasswordHashString,
) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash).is_ok())
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password verification task failed: {}", e)))
}
