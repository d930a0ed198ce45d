//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **ApplicationService**: client registration, ownership, approval workflow
//! - **TokenService**: the token ledger (codes, tokens, revocation, introspection)
//! - **OAuthService**: protocol parameter handling for the OAuth endpoints
//! - **GuardChain**: bearer/session decision for protected routes

pub mod application_service;
pub mod guard_chain;
pub mod oauth_service;
pub mod token_service;

pub use application_service::{
    ApplicationService, CreateApplicationDto, RegisteredApplication, RegistryError, Requester,
    ReviewDecision, UpdateApplicationDto,
};
pub use guard_chain::{GuardChain, GuardOutcome, RouteMeta, RESTRICTED_PATHS};
pub use oauth_service::{AuthorizeParams, OAuthService, TokenParams};
pub use token_service::{
    CodeExchange, Introspection, IssuedGrant, IssuedTokens, OAuthContext, OAuthError,
    PkceChallenge, TokenService,
};
