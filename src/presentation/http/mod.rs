//! HTTP Layer
//!
//! Routes, handlers, extractors and the per-route authentication table.

pub mod extractors;
pub mod handlers;
pub mod route_policy;
pub mod routes;

pub use route_policy::RoutePolicy;
pub use routes::create_router;
