//! Organization and invitation handlers.
//!
//! Authorization lives in `OrganizationService`; handlers only translate
//! between HTTP and the service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        organization::{CreateOrganizationRequest, InviteRequest, UpdateOrganizationRequest},
        MessageResponse,
    },
    middleware::AuthUser,
    models::{InvitationResponse, OrganizationDetailResponse, OrganizationResponse},
    utils::ValidatedJson,
    AppState,
};

// ============================================================================
// Organizations
// ============================================================================

/// List all organizations
#[utoipa::path(
    get,
    path = "/organizations",
    responses(
        (status = 200, description = "All organizations", body = [OrganizationResponse]),
        (status = 404, description = "No organizations exist", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<OrganizationResponse>>, AppError> {
    let orgs = state.org_service.list().await?;
    Ok(Json(orgs.into_iter().map(OrganizationResponse::from).collect()))
}

/// Create an organization owned by the caller
#[utoipa::path(
    post,
    path = "/organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = OrganizationResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn create_organization(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let org = state
        .org_service
        .create(user.user_id, &req.name, req.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(OrganizationResponse::from(org))))
}

/// Fetch one organization with its owner and members
#[utoipa::path(
    get,
    path = "/organizations/{org_id}",
    params(("org_id" = i64, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Organization detail", body = OrganizationDetailResponse),
        (status = 403, description = "Caller is neither owner nor member", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn get_organization(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(org_id): Path<i64>,
) -> Result<Json<OrganizationDetailResponse>, AppError> {
    let detail = state.org_service.get(user.user_id, org_id).await?;
    Ok(Json(detail.into()))
}

/// Update an organization (owner only)
#[utoipa::path(
    put,
    path = "/organizations/{org_id}",
    params(("org_id" = i64, Path, description = "Organization id")),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Organization updated", body = OrganizationResponse),
        (status = 403, description = "Not owned by caller, or does not exist", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn update_organization(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(org_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateOrganizationRequest>,
) -> Result<Json<OrganizationResponse>, AppError> {
    let org = state
        .org_service
        .update(user.user_id, org_id, &req.name, req.description.as_deref())
        .await?;

    Ok(Json(org.into()))
}

/// Delete an organization (owner only)
#[utoipa::path(
    delete,
    path = "/organizations/{org_id}",
    params(("org_id" = i64, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Organization deleted", body = MessageResponse),
        (status = 403, description = "Not owned by caller, or does not exist", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn delete_organization(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(org_id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.org_service.delete(user.user_id, org_id).await?;
    Ok(Json(MessageResponse::new("Organization deleted successfully")))
}

// ============================================================================
// Invitations
// ============================================================================

/// Invite a registered user by email (owner only)
#[utoipa::path(
    post,
    path = "/organizations/{org_id}/invite",
    params(("org_id" = i64, Path, description = "Organization id")),
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Invitation recorded", body = InvitationResponse),
        (status = 400, description = "Owner cannot be invited", body = ErrorResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 404, description = "Organization or user not found", body = ErrorResponse),
        (status = 409, description = "Already a member or already invited", body = ErrorResponse)
    ),
    tag = "Invitations",
    security(("bearer_auth" = []))
)]
pub async fn invite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(org_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let invitation = state
        .org_service
        .invite(user.user_id, org_id, &req.email)
        .await?;

    Ok((StatusCode::CREATED, Json(InvitationResponse::from(invitation))))
}

/// Accept the caller's pending invitation to an organization
#[utoipa::path(
    post,
    path = "/organizations/{org_id}/invitations/accept",
    params(("org_id" = i64, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Invitation accepted", body = InvitationResponse),
        (status = 404, description = "No pending invitation", body = ErrorResponse)
    ),
    tag = "Invitations",
    security(("bearer_auth" = []))
)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(org_id): Path<i64>,
) -> Result<Json<InvitationResponse>, AppError> {
    let invitation = state
        .org_service
        .accept_invitation(user.user_id, org_id)
        .await?;

    Ok(Json(invitation.into()))
}

/// Pending invitations addressed to the caller
#[utoipa::path(
    get,
    path = "/invitations",
    responses(
        (status = 200, description = "Pending invitations", body = [InvitationResponse])
    ),
    tag = "Invitations",
    security(("bearer_auth" = []))
)]
pub async fn list_invitations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<InvitationResponse>>, AppError> {
    let invitations = state.org_service.list_invitations(user.user_id).await?;
    Ok(Json(
        invitations
            .into_iter()
            .map(InvitationResponse::from)
            .collect(),
    ))
}
