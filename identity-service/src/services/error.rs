use service_core::error::AppError;
use thiserror::Error;

use super::jwt::TokenError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    /// Unknown email and wrong password both map here.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Refresh token not recognized")]
    RefreshTokenNotFound,

    #[error("Refresh token was already rotated")]
    RotationConflict,

    #[error("User not found")]
    UserNotFound,

    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("No organizations found")]
    NoOrganizations,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("User is already a member of the organization")]
    AlreadyMember,

    #[error("User already has a pending invitation to this organization")]
    InvitationAlreadyPending,

    #[error("Invitation not found")]
    InvitationNotFound,
}

/// Trim `value`, rejecting it when nothing is left.
pub(crate) fn trimmed_required<'a>(field: &str, value: &'a str) -> Result<&'a str, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be blank",
            field
        )));
    }
    Ok(trimmed)
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ServiceError::TokenExpired,
            TokenError::Invalid => ServiceError::InvalidToken,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(anyhow::Error::new(err))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::EmailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::TokenExpired => AppError::Unauthorized(anyhow::anyhow!("Token expired")),
            ServiceError::InvalidToken => AppError::Unauthorized(anyhow::anyhow!("Invalid token")),
            ServiceError::RefreshTokenNotFound => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid refresh token"))
            }
            ServiceError::RotationConflict => {
                AppError::Conflict(anyhow::anyhow!("Refresh token was already rotated"))
            }
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::OrganizationNotFound => {
                AppError::NotFound(anyhow::anyhow!("Organization not found"))
            }
            ServiceError::NoOrganizations => {
                AppError::NotFound(anyhow::anyhow!("No organizations found"))
            }
            ServiceError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::AlreadyMember => AppError::Conflict(anyhow::anyhow!(
                "User is already a member of the organization"
            )),
            ServiceError::InvitationAlreadyPending => AppError::Conflict(anyhow::anyhow!(
                "User already has a pending invitation to this organization"
            )),
            ServiceError::InvitationNotFound => {
                AppError::NotFound(anyhow::anyhow!("Invitation not found"))
            }
        }
    }
}
