//! Common Test Utilities
//!
//! In-memory repository doubles and a router driver for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use oauth_server::config::{
    CorsSettings, DatabaseSettings, JwtSettings, LogSettings, OAuthSettings, RateLimitSettings,
    RedisSettings, ServerSettings, Settings, WebSocketSettings,
};
use oauth_server::domain::{
    Application, ApplicationRepository, ApplicationStatus, AuthorizationGrant, GrantRepository,
    OAuthToken, TokenRepository, UserDirectory,
};
use oauth_server::infrastructure::repositories::Repositories;
use oauth_server::presentation::http::create_router;
use oauth_server::presentation::middleware::issue_session_token;
use oauth_server::shared::error::AppError;
use oauth_server::startup::AppState;

pub const TEST_JWT_SECRET: &str = "integration-test-session-secret-0123456789";
pub const REDIRECT_URI: &str = "https://client.example.com/callback";

pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://unused".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
            run_migrations: false,
        },
        redis: RedisSettings { url: None },
        jwt: JwtSettings {
            secret: TEST_JWT_SECRET.into(),
        },
        oauth: OAuthSettings::default(),
        rate_limit: RateLimitSettings {
            oauth_requests_per_minute: 30,
            gateway_connects_per_minute: 10,
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
            handshake_timeout_secs: 5,
        },
        log: LogSettings {
            format: "pretty".into(),
        },
        environment: "test".into(),
    }
}

// ============================================================================
// In-memory repositories
// ============================================================================

#[derive(Default)]
pub struct InMemoryApplications {
    rows: Mutex<HashMap<Uuid, Application>>,
}

#[async_trait]
impl ApplicationRepository for InMemoryApplications {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>, AppError> {
        Ok(self.rows.lock().get(&id).cloned())
    }

    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Application>, AppError> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|a| a.client_id == client_id)
            .cloned())
    }

    async fn find_by_websocket_id(
        &self,
        websocket_id: Uuid,
    ) -> Result<Option<Application>, AppError> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|a| a.websocket_id == websocket_id)
            .cloned())
    }

    async fn find_by_developer(&self, developer_id: i64) -> Result<Vec<Application>, AppError> {
        let mut owned: Vec<_> = self
            .rows
            .lock()
            .values()
            .filter(|a| a.developer_id == developer_id)
            .cloned()
            .collect();
        owned.sort_by_key(|a| a.created_at);
        Ok(owned)
    }

    async fn find_by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<Application>, AppError> {
        let mut matching: Vec<_> = self
            .rows
            .lock()
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|a| a.created_at);
        Ok(matching)
    }

    async fn client_id_exists(&self, client_id: &str) -> Result<bool, AppError> {
        Ok(self.rows.lock().values().any(|a| a.client_id == client_id))
    }

    async fn create(&self, application: &Application) -> Result<Application, AppError> {
        let mut rows = self.rows.lock();
        if rows.values().any(|a| {
            a.developer_id == application.developer_id && a.environment == application.environment
        }) {
            return Err(AppError::Conflict("environment already registered".into()));
        }
        rows.insert(application.id, application.clone());
        Ok(application.clone())
    }

    async fn update(&self, application: &Application) -> Result<Application, AppError> {
        let mut rows = self.rows.lock();
        let row = rows
            .get_mut(&application.id)
            .ok_or_else(|| AppError::NotFound("application".into()))?;
        *row = application.clone();
        Ok(application.clone())
    }

    async fn update_secret_hash(&self, id: Uuid, secret_hash: &str) -> Result<(), AppError> {
        if let Some(row) = self.rows.lock().get_mut(&id) {
            row.client_secret_hash = secret_hash.to_string();
        }
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: ApplicationStatus) -> Result<(), AppError> {
        if let Some(row) = self.rows.lock().get_mut(&id) {
            row.status = status;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.rows.lock().remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryGrants {
    rows: Mutex<HashMap<Uuid, AuthorizationGrant>>,
}

impl InMemoryGrants {
    /// Move every code's expiry into the past.
    pub fn expire_all(&self) {
        let past = Utc::now() - chrono::Duration::minutes(1);
        for grant in self.rows.lock().values_mut() {
            grant.expires_at = past;
        }
    }
}

#[async_trait]
impl GrantRepository for InMemoryGrants {
    async fn create(&self, grant: &AuthorizationGrant) -> Result<(), AppError> {
        self.rows.lock().insert(grant.id, grant.clone());
        Ok(())
    }

    async fn find_by_code_hash(
        &self,
        code_hash: &str,
    ) -> Result<Option<AuthorizationGrant>, AppError> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|g| g.code_hash == code_hash)
            .cloned())
    }

    async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        // Check and flip under one lock, like the conditional UPDATE
        let mut rows = self.rows.lock();
        match rows.get_mut(&id) {
            Some(grant) if grant.is_redeemable(now) => {
                grant.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let mut rows = self.rows.lock();
        let len = rows.len();
        rows.retain(|_, g| g.expires_at >= before);
        Ok((len - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryTokens {
    rows: Mutex<HashMap<Uuid, OAuthToken>>,
}

impl InMemoryTokens {
    pub fn all(&self) -> Vec<OAuthToken> {
        self.rows.lock().values().cloned().collect()
    }

    /// Move every access token's expiry into the past. Refresh expiries
    /// are left alone.
    pub fn expire_access_tokens(&self) {
        let past = Utc::now() - chrono::Duration::minutes(1);
        for token in self.rows.lock().values_mut() {
            token.expires_at = past;
        }
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokens {
    async fn create(&self, token: &OAuthToken) -> Result<(), AppError> {
        self.rows.lock().insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_access_hash(&self, hash: &str) -> Result<Option<OAuthToken>, AppError> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|t| t.access_token_hash == hash)
            .cloned())
    }

    async fn find_by_refresh_hash(&self, hash: &str) -> Result<Option<OAuthToken>, AppError> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|t| t.refresh_token_hash.as_deref() == Some(hash))
            .cloned())
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, AppError> {
        let mut rows = self.rows.lock();
        match rows.get_mut(&id) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                token.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_application(&self, application_id: Uuid) -> Result<u64, AppError> {
        let mut count = 0;
        for token in self.rows.lock().values_mut() {
            if token.application_id == application_id && !token.revoked {
                token.revoked = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(token) = self.rows.lock().get_mut(&id) {
            token.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let mut rows = self.rows.lock();
        let len = rows.len();
        rows.retain(|_, t| {
            let last_expiry = t.refresh_expires_at.map_or(t.expires_at, |r| r.max(t.expires_at));
            last_expiry >= before
        });
        Ok((len - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    names: Mutex<HashMap<i64, String>>,
}

impl InMemoryUsers {
    pub fn insert(&self, user_id: i64, username: &str) {
        self.names.lock().insert(user_id, username.to_string());
    }
}

#[async_trait]
impl UserDirectory for InMemoryUsers {
    async fn find_username(&self, user_id: i64) -> Result<Option<String>, AppError> {
        Ok(self.names.lock().get(&user_id).cloned())
    }
}

/// Handles to the doubles behind a `TestApp`.
#[derive(Clone, Default)]
pub struct TestStores {
    pub applications: Arc<InMemoryApplications>,
    pub grants: Arc<InMemoryGrants>,
    pub tokens: Arc<InMemoryTokens>,
    pub users: Arc<InMemoryUsers>,
}

impl TestStores {
    pub fn repositories(&self) -> Repositories {
        Repositories {
            applications: self.applications.clone(),
            grants: self.grants.clone(),
            tokens: self.tokens.clone(),
            users: self.users.clone(),
        }
    }
}

// ============================================================================
// Router driver
// ============================================================================

/// Test application builder
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub stores: TestStores,
}

impl TestApp {
    /// Create a new test application over in-memory stores
    pub fn new() -> Self {
        let stores = TestStores::default();
        stores.users.insert(1, "alice");
        stores.users.insert(2, "bob");
        stores.users.insert(99, "moderator");

        let state = AppState::new(test_settings(), stores.repositories());
        Self {
            router: create_router(state.clone()),
            state,
            stores,
        }
    }

    pub fn session(&self, user_id: i64) -> String {
        issue_session_token(user_id, None, TEST_JWT_SECRET, chrono::Duration::hours(1)).unwrap()
    }

    pub fn approver_session(&self, user_id: i64) -> String {
        issue_session_token(user_id, Some("admin"), TEST_JWT_SECRET, chrono::Duration::hours(1))
            .unwrap()
    }

    /// Send a request and decode the JSON body (`Null` when empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_with_session(&self, uri: &str, session: &str) -> (StatusCode, Value) {
        self.send(
            Request::get(uri)
                .header("X-Session-Token", session)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get_with_bearer(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(
            Request::get(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// JSON request with optional session and bearer credentials.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Value,
        session: Option<&str>,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(session) = session {
            builder = builder.header("X-Session-Token", session);
        }
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, body, None, None).await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Register an application through the API and return the response body
    /// (including `clientSecret`).
    pub async fn register_application(
        &self,
        user_id: i64,
        environment: &str,
        scopes: &[&str],
    ) -> Value {
        let session = self.session(user_id);
        let (status, body) = self
            .json(
                Method::POST,
                "/api/v1/applications",
                serde_json::json!({
                    "name": format!("{} app", environment),
                    "environment": environment,
                    "redirectUris": [REDIRECT_URI],
                    "scopes": scopes,
                }),
                Some(&session),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    /// Run the authorization step for `user_id` and return the code.
    pub async fn authorize(&self, user_id: i64, client_id: &str, extra: &str) -> String {
        let uri = format!(
            "/oauth/authorize?response_type=code&client_id={}&redirect_uri={}{}",
            client_id,
            urlencode(REDIRECT_URI),
            extra
        );
        let (status, body) = self.get_with_session(&uri, &self.session(user_id)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["code"].as_str().unwrap().to_string()
    }

    /// Exchange a code with the client's secret.
    pub async fn exchange_code(
        &self,
        application: &Value,
        code: &str,
        code_verifier: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut body = serde_json::json!({
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": REDIRECT_URI,
            "client_id": application["clientId"],
            "client_secret": application["clientSecret"],
        });
        if let Some(verifier) = code_verifier {
            body["code_verifier"] = Value::from(verifier);
        }
        self.post_json("/oauth/token", body).await
    }

    /// Register a development app for `user_id`, authorize `scope` and
    /// exchange the code. Returns (application, token response).
    pub async fn issue_user_tokens(&self, user_id: i64, scope: &str) -> (Value, Value) {
        let application = self.register_application(user_id, "development", &[]).await;
        let client_id = application["clientId"].as_str().unwrap().to_string();
        let code = self
            .authorize(user_id, &client_id, &format!("&scope={}", urlencode(scope)))
            .await;
        let (status, tokens) = self.exchange_code(&application, &code, None).await;
        assert_eq!(status, StatusCode::OK, "{tokens}");
        (application, tokens)
    }
}

/// Minimal percent-encoding for query values used in tests.
pub fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
