//! User Directory Implementation
//!
//! Read-only view of the `users` table owned by the account service.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::UserDirectory;
use crate::shared::error::AppError;

#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_username(&self, user_id: i64) -> Result<Option<String>, AppError> {
        let username: Option<String> =
            sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(username)
    }
}
