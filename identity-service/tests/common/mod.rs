//! Shared setup for router-level tests over the in-memory store.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use identity_service::{
    build_router,
    config::{
        Environment, IdentityConfig, JwtConfig, SecurityConfig, SwaggerConfig, SwaggerMode,
    },
    services::{InMemoryStore, JwtService},
    AppState,
};
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use tower::ServiceExt;

pub const ACCESS_SECRET: &str = "test-access-secret";
pub const REFRESH_SECRET: &str = "test-refresh-secret";

static TRACING: Once = Once::new();

fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: None,
        jwt: JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET),
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub jwt: JwtService,
}

pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub fn new() -> Self {
        init_test_tracing();

        let config = test_config();
        let jwt = JwtService::new(&config.jwt);
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(config, store.clone(), store.clone());
        let router = build_router(state).expect("router builds");

        Self { router, store, jwt }
    }

    /// Send a request and return the status and parsed JSON body (`Null` if empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> StatusCode {
        let (status, _) = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "username": username, "email": email, "password": password })),
            )
            .await;
        status
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Register and sign in, returning the issued pair.
    pub async fn signed_in(&self, username: &str, email: &str, password: &str) -> Tokens {
        assert_eq!(
            self.register(username, email, password).await,
            StatusCode::CREATED
        );
        let (status, body) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        Tokens {
            access_token: body["access_token"].as_str().unwrap().to_string(),
            refresh_token: body["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn get(&self, uri: &str, bearer: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(bearer), None).await
    }

    pub async fn post(&self, uri: &str, bearer: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(bearer), Some(body)).await
    }
}
