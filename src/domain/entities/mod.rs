//! # Domain Entities
//!
//! Core domain entities of the authorization server. Each persisted entity
//! maps directly to its database table.
//!
//! - **Application**: a registered third-party OAuth client
//! - **AuthorizationGrant**: a single-use authorization code
//! - **OAuthToken**: an issued access/refresh token pair
//! - **UserDirectory**: read access to accounts owned by the account service
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod application;
mod authorization_grant;
mod oauth_token;
mod user;

pub use application::{
    Application, ApplicationEnvironment, ApplicationRepository, ApplicationStatus,
};
pub use authorization_grant::{AuthorizationGrant, GrantRepository, PkceMethod};
pub use oauth_token::{OAuthToken, TokenKind, TokenRepository};
pub use user::UserDirectory;
