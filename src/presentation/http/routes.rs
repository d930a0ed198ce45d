//! Route Configuration
//!
//! Configures all HTTP routes. Every OAuth and API route passes through the
//! guard middleware, which consults the route policy table.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    create_cors_layer, create_trace_layer, guard_middleware, rate_limit_gateway, rate_limit_oauth,
    track_metrics, SecurityHeadersConfig, SecurityHeadersLayer,
};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    let security = SecurityHeadersConfig::for_environment(&state.settings.environment);

    Router::new()
        .merge(oauth_routes(state.clone()))
        .merge(api_routes(state.clone()))
        .merge(gateway_routes(state.clone()))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(track_metrics))
        .layer(create_trace_layer())
        .layer(create_cors_layer(&state.settings.cors))
        // Outermost so every response carries the headers
        .layer(SecurityHeadersLayer::new(security))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// OAuth endpoints, rate limited per client IP before the guard runs
fn oauth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/oauth/authorize", get(handlers::oauth::authorize))
        .route("/oauth/token", post(handlers::oauth::token))
        .route("/oauth/revoke", post(handlers::oauth::revoke))
        .route("/oauth/introspect", post(handlers::oauth::introspect))
        .route("/oauth/scopes", get(handlers::oauth::scopes))
        .route_layer(middleware::from_fn_with_state(state.clone(), guard_middleware))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_oauth))
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/applications",
            get(handlers::applications::list_applications)
                .post(handlers::applications::create_application),
        )
        .route(
            "/api/v1/applications/{application_id}",
            get(handlers::applications::get_application)
                .patch(handlers::applications::update_application)
                .delete(handlers::applications::delete_application),
        )
        .route(
            "/api/v1/applications/{application_id}/regenerate-secret",
            post(handlers::applications::regenerate_secret),
        )
        .route(
            "/api/v1/admin/applications/pending",
            get(handlers::admin::list_pending),
        )
        .route(
            "/api/v1/admin/applications/{application_id}/review",
            post(handlers::admin::review_application),
        )
        .route("/api/v1/me", get(handlers::me::me))
        .route_layer(middleware::from_fn_with_state(state, guard_middleware))
}

/// WebSocket gateway; applications authenticate with their websocketId
fn gateway_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/gateway", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_gateway))
}
