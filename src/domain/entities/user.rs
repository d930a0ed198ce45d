//! User directory trait.
//!
//! User accounts live in the `users` table owned by the account service.
//! The authorization server only needs to resolve a user id to a display
//! username for token introspection.

use async_trait::async_trait;

use crate::shared::error::AppError;

/// Read-only view over user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Username for a user id, or `None` if the account no longer exists.
    async fn find_username(&self, user_id: i64) -> Result<Option<String>, AppError>;
}
