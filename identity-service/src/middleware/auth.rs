use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use thiserror::Error;

use crate::models::User;
use crate::services::{CredentialStore, JwtService, ServiceError, TokenError, TokenKind};
use crate::AppState;

/// Why a bearer credential was refused.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingCredential,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Unknown subject")]
    UnknownSubject,

    #[error(transparent)]
    Store(#[from] ServiceError),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::Expired,
            TokenError::Invalid => AuthError::Invalid,
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(e) => e.into(),
            other => AppError::Unauthorized(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// Resolve an `Authorization` header value to a user.
///
/// The token store is not consulted: any unexpired access token signed with
/// the access key is accepted, even after its record has been rotated.
pub async fn authenticate(
    jwt: &JwtService,
    credentials: &dyn CredentialStore,
    raw_header: Option<&str>,
) -> Result<User, AuthError> {
    let token = raw_header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingCredential)?;

    let verified = jwt.decode(token, TokenKind::Access)?;

    credentials
        .find_user_by_id(verified.user_id)
        .await?
        .ok_or(AuthError::UnknownSubject)
}

/// The authenticated caller, placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Middleware to require authentication
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let raw_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let user = authenticate(&state.jwt, state.credentials.as_ref(), raw_header)
        .await
        .map_err(|e| {
            tracing::debug!(reason = %e, "Bearer authentication failed");
            AppError::from(e)
        })?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Extractor for the user resolved by `auth_middleware`.
pub struct AuthUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let current = parts.extensions.get::<CurrentUser>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Authenticated user missing from request extensions"
            ))
        })?;

        Ok(AuthUser(current.0.clone()))
    }
}
