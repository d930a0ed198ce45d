//! Guard Chain
//!
//! Decides how a request to a protected route is authenticated. Bearer
//! tokens are tried first on routes that allow them; requests without one
//! fall through to session authentication.

use std::sync::Arc;

use axum::http::Method;
use tracing::warn;

use super::token_service::{OAuthContext, OAuthError, TokenService};
use crate::domain::ScopeCatalog;

/// A path prefix where bearer tokens are never honored.
#[derive(Debug, Clone, Copy)]
pub struct RestrictedPath {
    pub prefix: &'static str,
    /// Restrict only state-changing methods
    pub writes_only: bool,
}

/// Account and client management stays on first-party sessions.
pub static RESTRICTED_PATHS: &[RestrictedPath] = &[
    RestrictedPath { prefix: "/api/v1/auth", writes_only: false },
    RestrictedPath { prefix: "/api/v1/users", writes_only: true },
    RestrictedPath { prefix: "/api/v1/applications", writes_only: false },
    RestrictedPath { prefix: "/api/v1/admin", writes_only: false },
    RestrictedPath { prefix: "/oauth/authorize", writes_only: false },
];

/// Per-route authentication requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub public: bool,
    /// Bearer callers need at least one of these
    pub required_scopes: Vec<&'static str>,
}

impl RouteMeta {
    pub fn public() -> Self {
        Self {
            public: true,
            required_scopes: Vec::new(),
        }
    }

    pub fn scoped(scopes: &[&'static str]) -> Self {
        Self {
            public: false,
            required_scopes: scopes.to_vec(),
        }
    }
}

/// Result of running the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// No authentication needed
    Public,
    /// Continue with session authentication
    Session,
    /// Authenticated by a bearer token
    Bearer(OAuthContext),
}

pub fn is_restricted(method: &Method, path: &str) -> bool {
    let is_write = !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
    RESTRICTED_PATHS.iter().any(|r| {
        let under = path == r.prefix
            || path
                .strip_prefix(r.prefix)
                .is_some_and(|rest| rest.starts_with('/'));
        under && (!r.writes_only || is_write)
    })
}

pub struct GuardChain {
    ledger: Arc<TokenService>,
}

impl GuardChain {
    pub fn new(ledger: Arc<TokenService>) -> Self {
        Self { ledger }
    }

    pub async fn evaluate(
        &self,
        meta: &RouteMeta,
        method: &Method,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<GuardOutcome, OAuthError> {
        if meta.public {
            return Ok(GuardOutcome::Public);
        }

        let Some(token) = bearer else {
            return Ok(GuardOutcome::Session);
        };

        if is_restricted(method, path) {
            warn!(%method, path, "Bearer token used on session-only route");
            return Err(OAuthError::SessionRequired);
        }

        let context = self.ledger.validate_bearer(token).await?;

        if !meta.required_scopes.is_empty()
            && !ScopeCatalog::has_any(&context.scopes, &meta.required_scopes)
        {
            warn!(
                application_id = %context.application_id,
                path,
                required = ?meta.required_scopes,
                "Bearer token lacks required scope"
            );
            return Err(OAuthError::InsufficientScope);
        }

        Ok(GuardOutcome::Bearer(context))
    }
}
