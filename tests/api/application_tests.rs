//! Application Registry API Tests

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{TestApp, REDIRECT_URI};

#[tokio::test]
async fn test_empty_scopes_store_catalog_defaults() {
    let app = TestApp::new();

    let application = app.register_application(1, "development", &[]).await;

    assert_eq!(
        application["scopes"],
        json!(["read:profile", "read:posts", "read:followers"])
    );
    assert!(application["clientSecret"].as_str().unwrap().starts_with("ocs_"));
    assert!(application.get("clientSecretHash").is_none());
}

#[tokio::test]
async fn test_production_application_starts_pending() {
    let app = TestApp::new();

    let application = app.register_application(1, "production", &[]).await;

    assert_eq!(application["status"], "PENDING");
}

#[tokio::test]
async fn test_second_application_in_same_environment_conflicts() {
    let app = TestApp::new();
    app.register_application(1, "development", &[]).await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/applications",
            json!({ "name": "again", "environment": "development", "redirectUris": [REDIRECT_URI] }),
            Some(&app.session(1)),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_third_application_exceeds_quota() {
    let app = TestApp::new();
    app.register_application(1, "development", &[]).await;
    app.register_application(1, "production", &[]).await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/applications",
            json!({ "name": "third", "environment": "development" }),
            Some(&app.session(1)),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_scope_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/applications",
            json!({ "name": "x", "environment": "development", "scopes": ["read:everything"] }),
            Some(&app.session(1)),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_approval_scope_needs_approver() {
    let app = TestApp::new();
    let body = json!({ "name": "dm", "environment": "development", "scopes": ["read:messages"] });

    let (status, _) = app
        .json(Method::POST, "/api/v1/applications", body.clone(), Some(&app.session(1)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, application) = app
        .json(
            Method::POST,
            "/api/v1/applications",
            body,
            Some(&app.approver_session(99)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(application["scopes"], json!(["read:messages"]));
}

#[tokio::test]
async fn test_owner_only_access() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let uri = format!("/api/v1/applications/{}", application["id"].as_str().unwrap());

    let (own, _) = app.get_with_session(&uri, &app.session(1)).await;
    let (other, _) = app.get_with_session(&uri, &app.session(2)).await;

    assert_eq!(own, StatusCode::OK);
    assert_eq!(other, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_and_update() {
    let app = TestApp::new();
    let session = app.session(1);
    let application = app.register_application(1, "development", &[]).await;
    let uri = format!("/api/v1/applications/{}", application["id"].as_str().unwrap());

    let (status, updated) = app
        .json(
            Method::PATCH,
            &uri,
            json!({ "name": "Renamed", "scopes": ["read:profile"] }),
            Some(&session),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["scopes"], json!(["read:profile"]));

    let (status, list) = app.get_with_session("/api/v1/applications", &session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app
        .json(Method::PATCH, &uri, json!({ "environment": "production" }), Some(&session), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_regenerated_secret_replaces_old_one() {
    let app = TestApp::new();
    let application = app.register_application(1, "development", &[]).await;
    let uri = format!(
        "/api/v1/applications/{}/regenerate-secret",
        application["id"].as_str().unwrap()
    );

    let (status, regenerated) = app
        .json(Method::POST, &uri, json!({}), Some(&app.session(1)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(regenerated["clientSecret"], application["clientSecret"]);

    let credentials = |secret: &serde_json::Value| {
        json!({
            "grant_type": "client_credentials",
            "client_id": application["clientId"],
            "client_secret": secret,
        })
    };
    let (old, _) = app
        .post_json("/oauth/token", credentials(&application["clientSecret"]))
        .await;
    let (new, _) = app
        .post_json("/oauth/token", credentials(&regenerated["clientSecret"]))
        .await;
    assert_eq!(old, StatusCode::UNAUTHORIZED);
    assert_eq!(new, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_revokes_tokens() {
    let app = TestApp::new();
    let (application, tokens) = app.issue_user_tokens(1, "read:profile").await;
    let uri = format!("/api/v1/applications/{}", application["id"].as_str().unwrap());

    let (status, _) = app
        .json(Method::DELETE, &uri, json!({}), Some(&app.session(1)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (me, _) = app
        .get_with_bearer("/api/v1/me", tokens["accessToken"].as_str().unwrap())
        .await;
    assert_eq!(me, StatusCode::UNAUTHORIZED);

    // Rows stay for audit, revoked
    let rows = app.stores.tokens.all();
    assert_eq!(rows.len(), 1);
    assert!(rows.iter().all(|t| t.revoked));

    let (_, introspection) = app
        .post_json("/oauth/introspect", json!({ "token": tokens["accessToken"] }))
        .await;
    assert_eq!(introspection, json!({ "active": false }));
}

#[tokio::test]
async fn test_approval_workflow() {
    let app = TestApp::new();
    let application = app.register_application(1, "production", &[]).await;
    let id = application["id"].as_str().unwrap();
    let review_uri = format!("/api/v1/admin/applications/{}/review", id);

    let (status, _) = app
        .get_with_session("/api/v1/admin/applications/pending", &app.session(1))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let approver = app.approver_session(99);
    let (status, pending) = app
        .get_with_session("/api/v1/admin/applications/pending", &approver)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending[0]["id"], id);

    let (status, approved) = app
        .json(Method::POST, &review_uri, json!({ "decision": "approve" }), Some(&approver), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "ACTIVE");

    // Approving twice is not a legal transition
    let (status, _) = app
        .json(Method::POST, &review_uri, json!({ "decision": "approve" }), Some(&approver), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, suspended) = app
        .json(Method::POST, &review_uri, json!({ "decision": "suspend" }), Some(&approver), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(suspended["status"], "SUSPENDED");
}

#[tokio::test]
async fn test_suspended_application_tokens_stop_working() {
    let app = TestApp::new();
    let (application, tokens) = app.issue_user_tokens(1, "read:profile").await;
    let review_uri = format!(
        "/api/v1/admin/applications/{}/review",
        application["id"].as_str().unwrap()
    );

    let (status, _) = app
        .json(
            Method::POST,
            &review_uri,
            json!({ "decision": "suspend", "reason": "abuse report" }),
            Some(&app.approver_session(99)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (me, _) = app
        .get_with_bearer("/api/v1/me", tokens["accessToken"].as_str().unwrap())
        .await;
    assert_ne!(me, StatusCode::OK);
}

#[tokio::test]
async fn test_registry_requires_session() {
    let app = TestApp::new();

    let (status, _) = app.get("/api/v1/applications").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
