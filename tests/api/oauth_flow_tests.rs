//! OAuth Protocol Tests
//!
//! Authorization code, refresh and client credentials grants, revocation
//! and introspection through the HTTP router.

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine};
use pretty_assertions::assert_eq;
use serde_json::json;

use oauth_server::application::services::OAuthError;

use crate::common::{urlencode, TestApp, REDIRECT_URI};

/// RFC 7636 Appendix B
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

#[tokio::test]
async fn test_end_to_end_code_flow() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    assert_eq!(application["status"], "ACTIVE");
    let client_id = application["clientId"].as_str().unwrap();

    let code = app
        .authorize(1, client_id, "&scope=read%3Aprofile&state=xyz")
        .await;
    assert!(code.starts_with("oac_"));

    let (status, tokens) = app.exchange_code(&application, &code, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["tokenType"], "Bearer");
    assert_eq!(tokens["scope"], "read:profile");
    assert_eq!(tokens["expiresIn"], 3600);
    assert!(tokens["accessToken"].as_str().unwrap().starts_with("oat_"));
    assert!(tokens["refreshToken"].as_str().unwrap().starts_with("ort_"));
}

#[tokio::test]
async fn test_authorize_echoes_state() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={}&redirect_uri={}&state=abc",
        application["clientId"].as_str().unwrap(),
        urlencode(REDIRECT_URI)
    );

    let (status, body) = app.get_with_session(&uri, &app.session(1)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "abc");
    assert_eq!(body["redirectUri"], REDIRECT_URI);
}

#[tokio::test]
async fn test_authorize_requires_session() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={}&redirect_uri={}",
        application["clientId"].as_str().unwrap(),
        urlencode(REDIRECT_URI)
    );

    let (status, _) = app.get(&uri).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorize_rejects_unregistered_redirect() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={}&redirect_uri={}",
        application["clientId"].as_str().unwrap(),
        urlencode("https://evil.example.com/cb")
    );

    let (status, body) = app.get_with_session(&uri, &app.session(1)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_authorize_rejects_scope_outside_application() {
    let app = TestApp::new();
    let application = app
        .register_application(1, "development", &["read:profile"])
        .await;
    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={}&redirect_uri={}&scope=write%3Aposts",
        application["clientId"].as_str().unwrap(),
        urlencode(REDIRECT_URI)
    );

    let (status, body) = app.get_with_session(&uri, &app.session(1)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_scope");
}

#[tokio::test]
async fn test_code_is_single_use() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let code = app
        .authorize(1, application["clientId"].as_str().unwrap(), "")
        .await;

    let (first, _) = app.exchange_code(&application, &code, None).await;
    let (second, body) = app.exchange_code(&application, &code, None).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_concurrent_exchanges_only_one_succeeds() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let code = app
        .authorize(1, application["clientId"].as_str().unwrap(), "")
        .await;

    let (a, b) = tokio::join!(
        app.exchange_code(&application, &code, None),
        app.exchange_code(&application, &code, None)
    );

    let successes = [a.0, b.0]
        .iter()
        .filter(|status| **status == StatusCode::OK)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(app.stores.tokens.all().len(), 1);
}

#[tokio::test]
async fn test_wrong_client_secret_rejected() {
    let app = TestApp::new();
    let mut application = app.register_application(1, "development", &[]).await;
    let code = app
        .authorize(1, application["clientId"].as_str().unwrap(), "")
        .await;
    application["clientSecret"] = json!("ocs_wrong");

    let (status, body) = app.exchange_code(&application, &code, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn test_pkce_s256_requires_matching_verifier() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let client_id = application["clientId"].as_str().unwrap();
    let pkce = format!("&code_challenge={}&code_challenge_method=S256", CHALLENGE);

    let code = app.authorize(1, client_id, &pkce).await;
    let (missing, _) = app.exchange_code(&application, &code, None).await;
    assert_eq!(missing, StatusCode::UNAUTHORIZED);

    let code = app.authorize(1, client_id, &pkce).await;
    let wrong = "x".repeat(43);
    let (mismatch, body) = app.exchange_code(&application, &code, Some(&wrong)).await;
    assert_eq!(mismatch, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_grant");

    let code = app.authorize(1, client_id, &pkce).await;
    let (ok, _) = app.exchange_code(&application, &code, Some(VERIFIER)).await;
    assert_eq!(ok, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rotates_token_pair() {
    let app = TestApp::new();
    let (application, tokens) = app.issue_user_tokens(1, "read:profile").await;
    let refresh_token = tokens["refreshToken"].as_str().unwrap();
    let refresh = json!({
        "grant_type": "refresh_token",
        "refresh_token": refresh_token,
        "client_id": application["clientId"],
        "client_secret": application["clientSecret"],
    });

    let (status, rotated) = app.post_json("/oauth/token", refresh.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["accessToken"], tokens["accessToken"]);
    assert_ne!(rotated["refreshToken"], tokens["refreshToken"]);
    assert_eq!(rotated["scope"], "read:profile");

    // The old pair is dead
    let (replay, body) = app.post_json("/oauth/token", refresh).await;
    assert_eq!(replay, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_grant");

    let (old_access, _) = app
        .get_with_bearer("/api/v1/me", tokens["accessToken"].as_str().unwrap())
        .await;
    assert_eq!(old_access, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_form_encoded_token_request_with_basic_auth() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let client_id = application["clientId"].as_str().unwrap();
    let client_secret = application["clientSecret"].as_str().unwrap();
    let code = app.authorize(1, client_id, "").await;

    let basic = STANDARD.encode(format!("{}:{}", client_id, client_secret));
    let form = format!(
        "grant_type=authorization_code&code={}&redirect_uri={}",
        code,
        urlencode(REDIRECT_URI)
    );
    let (status, tokens) = app
        .send(
            axum::http::Request::post("/oauth/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .header("Authorization", format!("Basic {}", basic))
                .body(axum::body::Body::from(form))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{tokens}");
    assert!(tokens["accessToken"].is_string());
}

#[tokio::test]
async fn test_client_credentials_grant() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;

    let (status, tokens) = app
        .post_json(
            "/oauth/token",
            json!({
                "grantType": "client_credentials",
                "clientId": application["clientId"],
                "clientSecret": application["clientSecret"],
                "scope": "read:posts",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["scope"], "read:posts");
    assert!(tokens.get("refreshToken").is_none());
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let app = TestApp::new();

    let (status, body) = app
        .post_json("/oauth/token", json!({ "grant_type": "password" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_revoke_unknown_token_succeeds() {
    let app = TestApp::new();

    let (status, _) = app
        .post_json("/oauth/revoke", json!({ "token": "oat_never_issued" }))
        .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_revoke_blank_token_succeeds() {
    let app = TestApp::new();
    let (_, tokens) = app.issue_user_tokens(1, "read:profile").await;

    let (status, _) = app.post_json("/oauth/revoke", json!({ "token": "" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post_json("/oauth/revoke", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    assert!(!app.stores.tokens.all()[0].revoked);
    let (status, _) = app
        .get_with_bearer("/api/v1/me", tokens["accessToken"].as_str().unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_revoked_token_is_inactive_and_rejected() {
    let app = TestApp::new();
    let (_, tokens) = app.issue_user_tokens(1, "read:profile").await;
    let access_token = tokens["accessToken"].as_str().unwrap();

    let (status, _) = app
        .post_json("/oauth/revoke", json!({ "token": access_token }))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Revoking again is still a success
    let (again, _) = app
        .post_json("/oauth/revoke", json!({ "token": access_token }))
        .await;
    assert_eq!(again, StatusCode::OK);

    let (_, introspection) = app
        .post_json("/oauth/introspect", json!({ "token": access_token }))
        .await;
    assert_eq!(introspection, json!({ "active": false }));

    let (me, _) = app.get_with_bearer("/api/v1/me", access_token).await;
    assert_eq!(me, StatusCode::UNAUTHORIZED);

    // The row is kept for history
    assert!(app.stores.tokens.all()[0].revoked);
}

#[tokio::test]
async fn test_revoking_refresh_token_kills_access_token() {
    let app = TestApp::new();
    let (_, tokens) = app.issue_user_tokens(1, "read:profile").await;

    app.post_json(
        "/oauth/revoke",
        json!({ "token": tokens["refreshToken"], "token_type_hint": "refresh_token" }),
    )
    .await;

    let (status, _) = app
        .get_with_bearer("/api/v1/me", tokens["accessToken"].as_str().unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_introspect_active_token() {
    let app = TestApp::new();
    let (application, tokens) = app.issue_user_tokens(1, "read:profile read:posts").await;

    let (status, body) = app
        .post_form(
            "/oauth/introspect",
            &format!("token={}", tokens["accessToken"].as_str().unwrap()),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);
    assert_eq!(body["scope"], "read:profile read:posts");
    assert_eq!(body["clientId"], application["clientId"]);
    assert_eq!(body["username"], "alice");
    assert!(body["exp"].is_i64());
}

#[tokio::test]
async fn test_introspect_unknown_token() {
    let app = TestApp::new();

    let (status, body) = app
        .post_json("/oauth/introspect", json!({ "token": "garbage" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "active": false }));
}

#[tokio::test]
async fn test_scope_catalog_is_public() {
    let app = TestApp::new();

    let (status, body) = app.get("/oauth/scopes").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["defaultScopes"],
        json!(["read:profile", "read:posts", "read:followers"])
    );
    assert!(body["scopes"].as_array().unwrap().len() > 10);
}

#[tokio::test]
async fn test_expired_code_rejected() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let code = app
        .authorize(1, application["clientId"].as_str().unwrap(), "")
        .await;
    app.stores.grants.expire_all();

    let (status, body) = app.exchange_code(&application, &code, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_grant");
    assert!(app.stores.tokens.all().is_empty());
}

#[tokio::test]
async fn test_exchange_redirect_must_match_authorization() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let code = app
        .authorize(1, application["clientId"].as_str().unwrap(), "")
        .await;

    let (status, body) = app
        .post_json(
            "/oauth/token",
            json!({
                "grant_type": "authorization_code",
                "code": code,
                "redirect_uri": "https://client.example.com/other",
                "client_id": application["clientId"],
                "client_secret": application["clientSecret"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_grant");

    // The code was not spent by the failed attempt
    let (status, _) = app.exchange_code(&application, &code, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_code_cannot_be_redeemed_by_another_client() {
    let app = TestApp::new();
    let owner = app.register_application(1, "development", &[]).await;
    let intruder = app.register_application(2, "development", &[]).await;
    let code = app.authorize(1, owner["clientId"].as_str().unwrap(), "").await;

    let (status, body) = app
        .post_json(
            "/oauth/token",
            json!({
                "grant_type": "authorization_code",
                "code": code,
                "redirect_uri": REDIRECT_URI,
                "client_id": intruder["clientId"],
                "client_secret": intruder["clientSecret"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_grant");
    assert!(app.stores.tokens.all().is_empty());

    let (status, _) = app.exchange_code(&owner, &code, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_token_bound_to_its_client() {
    let app = TestApp::new();
    let (_, tokens) = app.issue_user_tokens(1, "read:profile").await;
    let intruder = app.register_application(2, "development", &[]).await;

    let (status, body) = app
        .post_json(
            "/oauth/token",
            json!({
                "grant_type": "refresh_token",
                "refresh_token": tokens["refreshToken"],
                "client_id": intruder["clientId"],
                "client_secret": intruder["clientSecret"],
            }),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_grant");
    // Not rotated away from its owner
    let rows = app.stores.tokens.all();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].revoked);
}

#[tokio::test]
async fn test_expired_access_token_rejected() {
    let app = TestApp::new();
    let (_, tokens) = app.issue_user_tokens(1, "read:profile").await;
    let access = tokens["accessToken"].as_str().unwrap();
    app.stores.tokens.expire_access_tokens();

    let result = app.state.ledger.validate_bearer(access).await;
    assert!(matches!(result, Err(OAuthError::TokenExpired)));

    let (status, body) = app.get_with_bearer("/api/v1/me", access).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");

    let (_, introspection) = app
        .post_json("/oauth/introspect", json!({ "token": access }))
        .await;
    assert_eq!(introspection, json!({ "active": false }));
}
