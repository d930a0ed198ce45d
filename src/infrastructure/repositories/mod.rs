//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgApplicationRepository** - registered OAuth clients
//! - **PgGrantRepository** - single-use authorization codes
//! - **PgTokenRepository** - access/refresh token rows
//! - **PgUserDirectory** - username lookups against the account tables

pub mod application_repository;
pub mod grant_repository;
pub mod token_repository;
pub mod user_repository;

use std::sync::Arc;

use sqlx::PgPool;

use crate::domain::{ApplicationRepository, GrantRepository, TokenRepository, UserDirectory};

pub use application_repository::PgApplicationRepository;
pub use grant_repository::PgGrantRepository;
pub use token_repository::PgTokenRepository;
pub use user_repository::PgUserDirectory;

/// The full set of stores the services are built from.
#[derive(Clone)]
pub struct Repositories {
    pub applications: Arc<dyn ApplicationRepository>,
    pub grants: Arc<dyn GrantRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub users: Arc<dyn UserDirectory>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            applications: Arc::new(PgApplicationRepository::new(pool.clone())),
            grants: Arc::new(PgGrantRepository::new(pool.clone())),
            tokens: Arc::new(PgTokenRepository::new(pool.clone())),
            users: Arc::new(PgUserDirectory::new(pool)),
        }
    }
}
