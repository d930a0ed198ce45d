//! Guard Chain Tests
//!
//! Bearer tokens and sessions on protected routes.

use axum::http::{header, Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::ServiceExt;

use oauth_server::application::services::{GuardOutcome, OAuthError, RouteMeta};

use crate::common::TestApp;

#[tokio::test]
async fn test_bearer_with_required_scope_allowed() {
    let app = TestApp::new();
    let (application, tokens) = app.issue_user_tokens(1, "read:profile").await;

    let (status, me) = app
        .get_with_bearer("/api/v1/me", tokens["accessToken"].as_str().unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["authType"], "oauth");
    assert_eq!(me["userId"], 1);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["applicationId"], application["id"]);
    assert_eq!(me["scopes"], json!(["read:profile"]));
}

#[tokio::test]
async fn test_bearer_without_required_scope_forbidden() {
    let app = TestApp::new();
    let (_, tokens) = app.issue_user_tokens(1, "read:posts").await;

    let request = Request::get("/api/v1/me")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", tokens["accessToken"].as_str().unwrap()),
        )
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        "Bearer error=\"insufficient_scope\""
    );
}

/// read:profile token against a route requiring write:posts, and one
/// requiring read:profile.
#[tokio::test]
async fn test_scope_enforcement_per_route_metadata() {
    let app = TestApp::new();
    let (_, tokens) = app.issue_user_tokens(1, "read:profile").await;
    let token = tokens["accessToken"].as_str().unwrap();

    let write = app
        .state
        .guard
        .evaluate(
            &RouteMeta::scoped(&["write:posts"]),
            &Method::POST,
            "/api/v1/posts",
            Some(token),
        )
        .await;
    assert!(matches!(write, Err(OAuthError::InsufficientScope)));

    let read = app
        .state
        .guard
        .evaluate(
            &RouteMeta::scoped(&["read:profile"]),
            &Method::GET,
            "/api/v1/profile",
            Some(token),
        )
        .await;
    assert!(matches!(read, Ok(GuardOutcome::Bearer(ctx)) if ctx.user_id == Some(1)));

    let any_of = app
        .state
        .guard
        .evaluate(
            &RouteMeta::scoped(&["write:posts", "read:profile"]),
            &Method::GET,
            "/api/v1/feed",
            Some(token),
        )
        .await;
    assert!(any_of.is_ok());
}

#[tokio::test]
async fn test_bearer_rejected_on_restricted_path() {
    let app = TestApp::new();
    let (_, tokens) = app.issue_user_tokens(1, "read:profile").await;

    let (status, body) = app
        .get_with_bearer("/api/v1/applications", tokens["accessToken"].as_str().unwrap())
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access_denied");
}

#[tokio::test]
async fn test_session_bypasses_scope_checks() {
    let app = TestApp::new();

    let (status, me) = app.get_with_session("/api/v1/me", &app.session(2)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["authType"], "session");
    assert_eq!(me["username"], "bob");
    assert!(me.get("scopes").is_none());
}

#[tokio::test]
async fn test_invalid_bearer_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.get_with_bearer("/api/v1/me", "oat_forged").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_no_credentials_unauthorized() {
    let app = TestApp::new();

    let (status, _) = app.get("/api/v1/me").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_session_rejected() {
    let app = TestApp::new();
    let expired = oauth_server::presentation::middleware::issue_session_token(
        1,
        None,
        crate::common::TEST_JWT_SECRET,
        chrono::Duration::hours(-2),
    )
    .unwrap();

    let (status, _) = app.get_with_session("/api/v1/me", &expired).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_use_records_last_used() {
    let app = TestApp::new();
    let (_, tokens) = app.issue_user_tokens(1, "read:profile").await;

    app.get_with_bearer("/api/v1/me", tokens["accessToken"].as_str().unwrap())
        .await;

    // The touch runs in the background
    for _ in 0..50 {
        if app.stores.tokens.all()[0].last_used_at.is_some() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("last_used_at was never recorded");
}

#[tokio::test]
async fn test_public_route_ignores_bad_bearer() {
    let app = TestApp::new();

    let (status, catalog) = app.get_with_bearer("/oauth/scopes", "oat_forged").await;

    assert_eq!(status, StatusCode::OK);
    assert!(catalog["scopes"].is_array());
}

#[tokio::test]
async fn test_narrowed_application_scopes_apply_to_issued_tokens() {
    let app = TestApp::new();
    let (application, tokens) = app.issue_user_tokens(1, "read:profile read:posts").await;
    let token = tokens["accessToken"].as_str().unwrap();
    assert_eq!(app.get_with_bearer("/api/v1/me", token).await.0, StatusCode::OK);

    let uri = format!("/api/v1/applications/{}", application["id"].as_str().unwrap());
    let (status, _) = app
        .json(
            Method::PATCH,
            &uri,
            json!({ "scopes": ["read:posts"] }),
            Some(&app.session(1)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get_with_bearer("/api/v1/me", token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "insufficient_scope");

    let (_, introspection) = app
        .post_json("/oauth/introspect", json!({ "token": token }))
        .await;
    assert_eq!(introspection["active"], true);
    assert_eq!(introspection["scope"], "read:posts");
}
