use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{LoginRequest, RefreshRequest, RegisterRequest, TokenResponse},
        MessageResponse,
    },
    utils::{Password, ValidatedJson},
    AppState,
};

/// Register a new user
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = MessageResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .register(&req.username, &req.email, Password::new(req.password))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let pair = state
        .auth_service
        .sign_in(&req.email, Password::new(req.password))
        .await?;

    Ok(Json(TokenResponse::new(
        pair,
        state.jwt.access_token_expiry_seconds(),
    )))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = TokenResponse),
        (status = 401, description = "Expired, invalid or unknown refresh token", body = ErrorResponse),
        (status = 409, description = "Refresh token rotated concurrently", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let pair = state.auth_service.refresh(&req.refresh_token).await?;

    Ok(Json(TokenResponse::new(
        pair,
        state.jwt.access_token_expiry_seconds(),
    )))
}
