//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod admin;
pub mod applications;
pub mod health;
pub mod me;
pub mod oauth;
