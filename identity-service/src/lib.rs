pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, IdentityConfig, SwaggerMode};
use crate::services::{
    AuthService, CredentialStore, JwtService, OrganizationService, TokenStore,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::user::list_users,
        handlers::user::get_me,
        handlers::user::change_password,
        handlers::organization::list_organizations,
        handlers::organization::create_organization,
        handlers::organization::get_organization,
        handlers::organization::update_organization,
        handlers::organization::delete_organization,
        handlers::organization::invite,
        handlers::organization::accept_invitation,
        handlers::organization::list_invitations,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::RefreshRequest,
            dtos::auth::ChangePasswordRequest,
            dtos::auth::TokenResponse,
            dtos::organization::CreateOrganizationRequest,
            dtos::organization::UpdateOrganizationRequest,
            dtos::organization::InviteRequest,
            models::UserResponse,
            models::OrganizationResponse,
            models::OrganizationDetailResponse,
            models::InvitationResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, sign-in and token rotation"),
        (name = "User", description = "User listing and profile"),
        (name = "Organizations", description = "Organization management"),
        (name = "Invitations", description = "Organization invitations"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub jwt: JwtService,
    pub credentials: Arc<dyn CredentialStore>,
    pub auth_service: AuthService,
    pub org_service: OrganizationService,
}

impl AppState {
    /// Wire services over the given stores.
    pub fn new(
        config: IdentityConfig,
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt);
        let auth_service = AuthService::new(credentials.clone(), tokens, jwt.clone());
        let org_service = OrganizationService::new(credentials.clone());

        Self {
            config,
            jwt,
            credentials,
            auth_service,
            org_service,
        }
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let protected = Router::new()
        .route("/users", get(handlers::user::list_users))
        .route("/users/me", get(handlers::user::get_me))
        .route("/users/me/password", post(handlers::user::change_password))
        .route(
            "/organizations",
            get(handlers::organization::list_organizations)
                .post(handlers::organization::create_organization),
        )
        .route(
            "/organizations/:org_id",
            get(handlers::organization::get_organization)
                .put(handlers::organization::update_organization)
                .delete(handlers::organization::delete_organization),
        )
        .route(
            "/organizations/:org_id/invite",
            post(handlers::organization::invite),
        )
        .route(
            "/organizations/:org_id/invitations/accept",
            post(handlers::organization::accept_invitation),
        )
        .route("/invitations", get(handlers::organization::list_invitations))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .merge(protected);

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => state.config.swagger.enabled == SwaggerMode::Public,
    };

    if swagger_enabled {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let cors = cors_layer(&state.config)?;

    let app = app
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

fn cors_layer(config: &IdentityConfig) -> Result<CorsLayer, AppError> {
    let origins = config
        .security
        .allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.credentials.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
    })))
}
