//! Middleware
//!
//! Tower middleware for request processing.

pub mod auth;
pub mod cors;
pub mod guard;
pub mod logging;
pub mod rate_limit;
pub mod security;

pub use auth::{authenticate_session, issue_session_token, SessionClaims, SessionUser};
pub use cors::create_cors_layer;
pub use guard::guard_middleware;
pub use logging::{create_trace_layer, track_metrics};
pub use rate_limit::{rate_limit_gateway, rate_limit_oauth, RateLimitInfo, RateLimiter};
pub use security::{SecurityHeadersConfig, SecurityHeadersLayer};
