//! Response DTOs
//!
//! Data structures for API response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::application::services::{IssuedGrant, IssuedTokens, OAuthContext, RegisteredApplication};
use crate::domain::{
    Application, ApplicationEnvironment, ApplicationStatus, ScopeCatalog, ScopeDefinition,
};

/// Application response. Never carries the secret hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub developer_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub environment: ApplicationEnvironment,
    pub client_id: String,
    pub websocket_id: Uuid,
    pub status: ApplicationStatus,
    pub scopes: Vec<String>,
    pub redirect_uris: Vec<String>,
    pub rate_limit: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Application> for ApplicationResponse {
    fn from(app: Application) -> Self {
        Self {
            id: app.id,
            developer_id: app.developer_id,
            name: app.name,
            description: app.description,
            environment: app.environment,
            client_id: app.client_id,
            websocket_id: app.websocket_id,
            status: app.status,
            scopes: app.scopes,
            redirect_uris: app.redirect_uris,
            rate_limit: app.rate_limit,
            created_at: app.created_at,
            updated_at: app.updated_at,
        }
    }
}

/// Application plus its plaintext secret, returned only on create and
/// secret regeneration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSecretResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub client_secret: String,
}

impl From<RegisteredApplication> for ApplicationSecretResponse {
    fn from(registered: RegisteredApplication) -> Self {
        Self {
            application: registered.application.into(),
            client_secret: registered.client_secret,
        }
    }
}

/// Authorization code response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub redirect_uri: String,
    pub expires_in: i64,
}

impl From<IssuedGrant> for AuthorizeResponse {
    fn from(grant: IssuedGrant) -> Self {
        Self {
            code: grant.code,
            state: grant.state,
            redirect_uri: grant.redirect_uri,
            expires_in: grant.expires_in,
        }
    }
}

/// Token endpoint response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}

impl From<IssuedTokens> for TokenResponse {
    fn from(tokens: IssuedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer",
            expires_in: tokens.expires_in,
            scope: ScopeCatalog::format(&tokens.scopes),
        }
    }
}

/// Scope catalog response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeCatalogResponse {
    pub scopes: &'static [ScopeDefinition],
    pub default_scopes: Vec<String>,
}

impl ScopeCatalogResponse {
    pub fn current() -> Self {
        Self {
            scopes: ScopeCatalog::all_scopes(),
            default_scopes: ScopeCatalog::default_scopes(),
        }
    }
}

/// Caller identity as seen by a protected route
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub auth_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl MeResponse {
    pub fn session(user_id: i64, username: Option<String>) -> Self {
        Self {
            auth_type: "session",
            user_id: Some(user_id),
            username,
            application_id: None,
            scopes: None,
        }
    }

    pub fn oauth(context: &OAuthContext, username: Option<String>) -> Self {
        Self {
            auth_type: context.token_type,
            user_id: context.user_id,
            username,
            application_id: Some(context.application_id),
            scopes: Some(context.scopes.clone()),
        }
    }
}
