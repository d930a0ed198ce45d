//! Token Repository Implementation
//!
//! PostgreSQL implementation of the TokenRepository trait over the
//! `oauth_tokens` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{OAuthToken, TokenRepository};
use crate::shared::error::AppError;

const COLUMNS: &str = "id, user_id, application_id, access_token_hash, refresh_token_hash, \
     scopes, revoked, expires_at, refresh_expires_at, last_used_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    user_id: Option<i64>,
    application_id: Uuid,
    access_token_hash: String,
    refresh_token_hash: Option<String>,
    scopes: Vec<String>,
    revoked: bool,
    expires_at: DateTime<Utc>,
    refresh_expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TokenRow> for OAuthToken {
    fn from(row: TokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            application_id: row.application_id,
            access_token_hash: row.access_token_hash,
            refresh_token_hash: row.refresh_token_hash,
            scopes: row.scopes,
            revoked: row.revoked,
            expires_at: row.expires_at,
            refresh_expires_at: row.refresh_expires_at,
            last_used_at: row.last_used_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL token repository.
#[derive(Clone)]
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn create(&self, token: &OAuthToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens (
                id, user_id, application_id, access_token_hash, refresh_token_hash, scopes,
                revoked, expires_at, refresh_expires_at, last_used_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(token.application_id)
        .bind(&token.access_token_hash)
        .bind(&token.refresh_token_hash)
        .bind(&token.scopes)
        .bind(token.revoked)
        .bind(token.expires_at)
        .bind(token.refresh_expires_at)
        .bind(token.last_used_at)
        .bind(token.created_at)
        .bind(token.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_access_hash(&self, hash: &str) -> Result<Option<OAuthToken>, AppError> {
        let sql = format!("SELECT {} FROM oauth_tokens WHERE access_token_hash = $1", COLUMNS);
        let row = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_refresh_hash(&self, hash: &str) -> Result<Option<OAuthToken>, AppError> {
        let sql = format!("SELECT {} FROM oauth_tokens WHERE refresh_token_hash = $1", COLUMNS);
        let row = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, AppError> {
        let revoked: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE oauth_tokens
            SET revoked = TRUE, updated_at = NOW()
            WHERE id = $1 AND revoked = FALSE
            RETURNING id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(revoked.is_some())
    }

    async fn revoke_all_for_application(&self, application_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE oauth_tokens SET revoked = TRUE, updated_at = NOW() \
             WHERE application_id = $1 AND revoked = FALSE",
        )
        .bind(application_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE oauth_tokens SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM oauth_tokens
            WHERE GREATEST(expires_at, COALESCE(refresh_expires_at, expires_at)) < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
