//! Authorization Code Repository Implementation
//!
//! PostgreSQL implementation of the GrantRepository trait over the
//! `oauth_authorization_codes` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{AuthorizationGrant, GrantRepository, PkceMethod};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct GrantRow {
    id: Uuid,
    code_hash: String,
    application_id: Uuid,
    user_id: i64,
    redirect_uri: String,
    scopes: Vec<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
    state: Option<String>,
    expires_at: DateTime<Utc>,
    consumed: bool,
    created_at: DateTime<Utc>,
}

impl GrantRow {
    fn into_grant(self) -> AuthorizationGrant {
        AuthorizationGrant {
            id: self.id,
            code_hash: self.code_hash,
            application_id: self.application_id,
            user_id: self.user_id,
            redirect_uri: self.redirect_uri,
            scopes: self.scopes,
            code_challenge: self.code_challenge,
            code_challenge_method: self
                .code_challenge_method
                .as_deref()
                .and_then(PkceMethod::parse),
            state: self.state,
            expires_at: self.expires_at,
            consumed: self.consumed,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL authorization code repository.
#[derive(Clone)]
pub struct PgGrantRepository {
    pool: PgPool,
}

impl PgGrantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GrantRepository for PgGrantRepository {
    async fn create(&self, grant: &AuthorizationGrant) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_authorization_codes (
                id, code_hash, application_id, user_id, redirect_uri, scopes,
                code_challenge, code_challenge_method, state, expires_at, consumed, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(grant.id)
        .bind(&grant.code_hash)
        .bind(grant.application_id)
        .bind(grant.user_id)
        .bind(&grant.redirect_uri)
        .bind(&grant.scopes)
        .bind(&grant.code_challenge)
        .bind(grant.code_challenge_method.map(|m| m.as_str()))
        .bind(&grant.state)
        .bind(grant.expires_at)
        .bind(grant.consumed)
        .bind(grant.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_code_hash(&self, code_hash: &str) -> Result<Option<AuthorizationGrant>, AppError> {
        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT id, code_hash, application_id, user_id, redirect_uri, scopes,
                   code_challenge, code_challenge_method, state, expires_at, consumed, created_at
            FROM oauth_authorization_codes
            WHERE code_hash = $1
            "#,
        )
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(GrantRow::into_grant))
    }

    async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let consumed: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE oauth_authorization_codes
            SET consumed = TRUE
            WHERE id = $1 AND consumed = FALSE AND expires_at > $2
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(consumed.is_some())
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM oauth_authorization_codes WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
