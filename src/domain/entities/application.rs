//! OAuth client application entity and repository trait.
//!
//! Maps to the `oauth_applications` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Lifecycle status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplicationStatus {
    Pending,
    Active,
    Rejected,
    Suspended,
}

impl ApplicationStatus {
    /// Convert from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "ACTIVE" => Some(Self::Active),
            "REJECTED" => Some(Self::Rejected),
            "SUSPENDED" => Some(Self::Suspended),
            _ => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Rejected => "REJECTED",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deployment environment an application is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationEnvironment {
    Development,
    Production,
}

impl ApplicationEnvironment {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "development" => Some(Self::Development),
            "production" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Status a freshly registered application starts in.
    ///
    /// Production clients wait for an approver; development clients are
    /// usable immediately.
    pub fn initial_status(&self) -> ApplicationStatus {
        match self {
            Self::Development => ApplicationStatus::Active,
            Self::Production => ApplicationStatus::Pending,
        }
    }
}

impl std::fmt::Display for ApplicationEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered third-party OAuth client.
///
/// Maps to the `oauth_applications` table:
/// - id: UUID PRIMARY KEY
/// - developer_id: BIGINT NOT NULL (owning user)
/// - name: VARCHAR(100) NOT NULL
/// - description: TEXT NULL
/// - environment: VARCHAR(16) NOT NULL, UNIQUE with developer_id
/// - client_id: VARCHAR(64) NOT NULL UNIQUE
/// - client_secret_hash: TEXT NOT NULL (Argon2id PHC string)
/// - websocket_id: UUID NOT NULL UNIQUE
/// - status: VARCHAR(16) NOT NULL
/// - scopes: TEXT[] NOT NULL
/// - redirect_uris: TEXT[] NOT NULL
/// - rate_limit: INTEGER NOT NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub developer_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub environment: ApplicationEnvironment,
    pub client_id: String,

    /// Argon2id hash of the client secret (the plaintext is never stored)
    #[serde(skip_serializing)]
    pub client_secret_hash: String,

    /// Gateway identifier; a separate namespace from the OAuth credentials
    pub websocket_id: Uuid,
    pub status: ApplicationStatus,
    pub scopes: Vec<String>,
    pub redirect_uris: Vec<String>,

    /// Requests per minute allowed for bearer calls made with this client's tokens
    pub rate_limit: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn is_active(&self) -> bool {
        self.status == ApplicationStatus::Active
    }

    pub fn is_owned_by(&self, developer_id: i64) -> bool {
        self.developer_id == developer_id
    }

    /// Exact-match check against the registered redirect URIs.
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Repository trait for Application data access operations.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>, AppError>;

    /// Find by the public OAuth client identifier.
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Application>, AppError>;

    /// Find by the gateway identifier.
    async fn find_by_websocket_id(&self, websocket_id: Uuid)
        -> Result<Option<Application>, AppError>;

    /// All applications owned by a developer, oldest first.
    async fn find_by_developer(&self, developer_id: i64) -> Result<Vec<Application>, AppError>;

    /// All applications in a given status, oldest first.
    async fn find_by_status(&self, status: ApplicationStatus)
        -> Result<Vec<Application>, AppError>;

    async fn client_id_exists(&self, client_id: &str) -> Result<bool, AppError>;

    /// Insert a new application. Fails with `Conflict` when the developer
    /// already owns an application in the same environment.
    async fn create(&self, application: &Application) -> Result<Application, AppError>;

    /// Persist name, description, scopes, redirect URIs and rate limit.
    async fn update(&self, application: &Application) -> Result<Application, AppError>;

    async fn update_secret_hash(&self, id: Uuid, secret_hash: &str) -> Result<(), AppError>;

    async fn update_status(&self, id: Uuid, status: ApplicationStatus) -> Result<(), AppError>;

    /// Delete an application. Returns false if it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}
