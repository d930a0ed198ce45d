//! Route Policy Table
//!
//! Authentication metadata per `(method, route template)`, built once at
//! startup and consulted by the guard middleware.

use std::collections::HashMap;

use axum::http::Method;

use crate::application::services::RouteMeta;

#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    routes: HashMap<&'static str, HashMap<Method, RouteMeta>>,
}

impl RoutePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(mut self, method: Method, path: &'static str, meta: RouteMeta) -> Self {
        self.routes.entry(path).or_default().insert(method, meta);
        self
    }

    /// No authentication at all.
    pub fn public(self, method: Method, path: &'static str) -> Self {
        self.insert(method, path, RouteMeta::public())
    }

    /// Session or a bearer token holding one of `scopes`.
    pub fn scoped(self, method: Method, path: &'static str, scopes: &[&'static str]) -> Self {
        self.insert(method, path, RouteMeta::scoped(scopes))
    }

    /// Metadata for a matched route. Unlisted routes require authentication
    /// with no scope requirement.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteMeta {
        self.routes
            .get(path)
            .and_then(|methods| methods.get(method))
            .cloned()
            .unwrap_or_default()
    }

    /// The server's route table.
    pub fn standard() -> Self {
        Self::new()
            .public(Method::POST, "/oauth/token")
            .public(Method::POST, "/oauth/revoke")
            .public(Method::POST, "/oauth/introspect")
            .public(Method::GET, "/oauth/scopes")
            .scoped(Method::GET, "/api/v1/me", &["read:profile"])
    }
}
