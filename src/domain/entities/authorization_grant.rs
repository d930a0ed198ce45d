//! Authorization code entity and repository trait.
//!
//! Maps to the `oauth_authorization_codes` table. Codes are single-use and
//! short-lived; only the SHA-256 digest of the code is stored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// PKCE transform declared at authorization time (RFC 7636 §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    #[serde(rename = "S256")]
    S256,
    #[serde(rename = "plain")]
    Plain,
}

impl PkceMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "S256" => Some(Self::S256),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

/// A pending authorization code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub id: Uuid,

    /// SHA-256 hex digest of the code handed to the client
    #[serde(skip_serializing)]
    pub code_hash: String,
    pub application_id: Uuid,
    pub user_id: i64,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<PkceMethod>,
    pub state: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationGrant {
    /// Unconsumed and not yet expired.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && now < self.expires_at
    }
}

/// Repository trait for authorization code storage.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    async fn create(&self, grant: &AuthorizationGrant) -> Result<(), AppError>;

    async fn find_by_code_hash(&self, code_hash: &str)
        -> Result<Option<AuthorizationGrant>, AppError>;

    /// Mark a grant consumed in one conditional write.
    ///
    /// Returns true only for the single caller that flipped an unconsumed,
    /// unexpired grant; every concurrent or later caller gets false.
    async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError>;

    /// Delete grants that expired before `before`. Returns the number removed.
    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}
