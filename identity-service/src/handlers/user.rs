use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{auth::ChangePasswordRequest, MessageResponse},
    middleware::AuthUser,
    models::UserResponse,
    utils::{Password, ValidatedJson},
    AppState,
};

/// List every registered user
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.auth_service.list_users().await?;
    Ok(Json(users.iter().map(|u| u.sanitized()).collect()))
}

/// Current user profile
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Authenticated user", body = UserResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.sanitized())
}

/// Change the current user's password
#[utoipa::path(
    post,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password incorrect", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth_service
        .change_password(
            &user,
            Password::new(req.current_password),
            Password::new(req.new_password),
        )
        .await?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}
