//! Infrastructure Layer
//!
//! Implementations for external services:
//! - Database repositories (PostgreSQL)
//! - Redis connection for rate limiting
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod redis_store;
pub mod repositories;
