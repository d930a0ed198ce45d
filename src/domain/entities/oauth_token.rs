//! OAuth token entity and repository trait.
//!
//! Maps to the `oauth_tokens` table. One row per issuance carries the
//! access token digest and, for user grants, the refresh token digest.
//! Rows are never deleted on revocation; they stay for introspection
//! history until the housekeeping purge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Which credential of a token row a presented string matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AccessToken,
    RefreshToken,
}

impl TokenKind {
    /// Parse an RFC 7009 / RFC 7662 `token_type_hint`.
    pub fn from_hint(hint: Option<&str>) -> Option<Self> {
        match hint? {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

/// An issued access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub id: Uuid,

    /// None for client-credentials tokens
    pub user_id: Option<i64>,
    pub application_id: Uuid,

    #[serde(skip_serializing)]
    pub access_token_hash: String,

    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    pub scopes: Vec<String>,
    pub revoked: bool,

    /// Access token expiry
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthToken {
    pub fn access_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }

    pub fn refresh_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked
            && self.refresh_token_hash.is_some()
            && self.refresh_expires_at.is_some_and(|exp| now < exp)
    }

    /// Expiry of the credential of the given kind.
    pub fn expiry_of(&self, kind: TokenKind) -> Option<DateTime<Utc>> {
        match kind {
            TokenKind::AccessToken => Some(self.expires_at),
            TokenKind::RefreshToken => self.refresh_expires_at,
        }
    }
}

/// Repository trait for token storage.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn create(&self, token: &OAuthToken) -> Result<(), AppError>;

    async fn find_by_access_hash(&self, hash: &str) -> Result<Option<OAuthToken>, AppError>;

    async fn find_by_refresh_hash(&self, hash: &str) -> Result<Option<OAuthToken>, AppError>;

    /// Flip `revoked` in one conditional write. Returns true only if this
    /// call changed the row (it was not already revoked).
    async fn revoke(&self, id: Uuid) -> Result<bool, AppError>;

    /// Revoke every live token of an application. Returns rows affected.
    async fn revoke_all_for_application(&self, application_id: Uuid) -> Result<u64, AppError>;

    /// Update `last_used_at`.
    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Delete rows whose every credential expired before `before`.
    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}
