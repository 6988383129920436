mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::TestApp;
use identity_service::services::TokenKind;
use serde_json::json;

#[tokio::test]
async fn register_returns_message_and_rejects_duplicate_email() {
    let app = TestApp::new();

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "alice", "email": "a@x.com", "password": "pw1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User registered successfully");

    assert_eq!(
        app.register("alice2", "A@X.com", "other").await,
        StatusCode::CONFLICT
    );

    // First user is untouched.
    let (status, _) = app.login("a@x.com", "pw1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new();

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "alice", "email": "not-an-email", "password": "pw1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Validation error");
    assert!(body["details"].as_str().unwrap().contains("email"));

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "   ", "email": "a@x.com", "password": "pw1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"].as_str().unwrap().contains("username"));

    // Nothing was stored, so the address is still free.
    assert_eq!(app.register("alice", "a@x.com", "pw1").await, StatusCode::CREATED);
}

#[tokio::test]
async fn login_issues_thirty_minute_access_token() {
    let app = TestApp::new();
    app.register("alice", "a@x.com", "pw1").await;

    let (status, body) = app.login("a@x.com", "pw1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 1800);

    let access = body["access_token"].as_str().unwrap();
    let verified = app.jwt.decode(access, TokenKind::Access).unwrap();
    let expected = Utc::now() + Duration::minutes(30);
    assert!((verified.expires_at - expected).num_seconds().abs() <= 5);

    let (_, me) = app.get("/users/me", access).await;
    assert_eq!(verified.user_id, me["user_id"].as_i64().unwrap());
    assert!(app
        .store
        .find_by_access_token(access)
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn bad_password_and_unknown_email_look_identical() {
    let app = TestApp::new();
    app.register("alice", "a@x.com", "pw1").await;

    let wrong_password = app.login("a@x.com", "wrong").await;
    let unknown_email = app.login("nobody@x.com", "pw1").await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
    assert_eq!(wrong_password.1["error"], "Invalid credentials");
}

#[tokio::test]
async fn each_sign_in_creates_a_new_record() {
    let app = TestApp::new();
    app.register("alice", "a@x.com", "pw1").await;

    let (_, first) = app.login("a@x.com", "pw1").await;
    let (_, second) = app.login("a@x.com", "pw1").await;

    assert_ne!(first["access_token"], second["access_token"]);
    assert_eq!(app.store.token_count().unwrap(), 2);
}

#[tokio::test]
async fn refresh_rotates_pair_in_place() {
    let app = TestApp::new();
    let original = app.signed_in("alice", "a@x.com", "pw1").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": original.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let new_access = body["access_token"].as_str().unwrap();
    let new_refresh = body["refresh_token"].as_str().unwrap();
    assert_ne!(new_access, original.access_token);
    assert_ne!(new_refresh, original.refresh_token);

    let record = app
        .store
        .find_by_access_token(new_access)
        .unwrap()
        .unwrap();
    assert_eq!(record.refresh_token, new_refresh);
    assert!(record.active_flag);
    assert_eq!(app.store.token_count().unwrap(), 1);
}

#[tokio::test]
async fn refresh_with_spent_token_is_unauthorized() {
    let app = TestApp::new();
    let original = app.signed_in("alice", "a@x.com", "pw1").await;
    let body = json!({ "refresh_token": original.refresh_token });

    let (status, _) = app
        .request(Method::POST, "/auth/refresh", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::POST, "/auth/refresh", None, Some(body))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid refresh token");
}

#[tokio::test]
async fn refresh_with_expired_token_reports_expiry() {
    let app = TestApp::new();
    let tokens = app.signed_in("alice", "a@x.com", "pw1").await;
    let user_id = app
        .jwt
        .decode(&tokens.access_token, TokenKind::Access)
        .unwrap()
        .user_id;

    let expired = app
        .jwt
        .issue_with_lifetime(
            user_id,
            TokenKind::Refresh,
            Utc::now() - Duration::days(8),
            Duration::days(7),
        )
        .unwrap();

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": expired })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token expired");
}

#[tokio::test]
async fn access_token_cannot_be_used_to_refresh() {
    let app = TestApp::new();
    let tokens = app.signed_in("alice", "a@x.com", "pw1").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": tokens.access_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn protected_routes_require_valid_bearer() {
    let app = TestApp::new();
    let tokens = app.signed_in("alice", "a@x.com", "pw1").await;

    let (status, body) = app.request(Method::GET, "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing bearer token");

    let (status, body) = app.get("/users", "garbage").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");

    let (status, _) = app.get("/users", &tokens.refresh_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user_id = app
        .jwt
        .decode(&tokens.access_token, TokenKind::Access)
        .unwrap()
        .user_id;
    let expired = app
        .jwt
        .issue_with_lifetime(
            user_id,
            TokenKind::Access,
            Utc::now() - Duration::hours(1),
            Duration::minutes(30),
        )
        .unwrap();
    let (status, body) = app.get("/users", &expired).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token expired");

    let ghost = app.jwt.issue(99_999, TokenKind::Access, Utc::now()).unwrap();
    let (status, body) = app.get("/users", &ghost).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unknown subject");
}

#[tokio::test]
async fn user_listing_is_sanitized() {
    let app = TestApp::new();
    let tokens = app.signed_in("alice", "a@x.com", "pw1").await;
    app.register("bob", "b@x.com", "pw2").await;

    let (status, body) = app.get("/users", &tokens.access_token).await;
    assert_eq!(status, StatusCode::OK);

    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    for user in users {
        assert!(user.get("password_hash").is_none());
        assert!(user.get("user_id").is_some());
    }
    assert_eq!(users[0]["email"], "a@x.com");
}

#[tokio::test]
async fn rotated_away_access_token_stays_valid_until_expiry() {
    let app = TestApp::new();
    let original = app.signed_in("alice", "a@x.com", "pw1").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": original.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/users/me", &original.access_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let app = TestApp::new();
    let tokens = app.signed_in("alice", "a@x.com", "pw1").await;

    let (status, body) = app
        .post(
            "/users/me/password",
            &tokens.access_token,
            json!({ "current_password": "wrong", "new_password": "pw2" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = app
        .post(
            "/users/me/password",
            &tokens.access_token,
            json!({ "current_password": "pw1", "new_password": "pw2" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.login("a@x.com", "pw1").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("a@x.com", "pw2").await.0, StatusCode::OK);

    // Outstanding tokens are not revoked.
    let (status, _) = app.get("/users/me", &tokens.access_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_service() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "identity-service-test");
}
