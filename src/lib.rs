//! # OAuth Server Library
//!
//! This crate provides the authorization-server core of a social platform:
//! - OAuth 2.0 authorization code (with PKCE), refresh token and client
//!   credentials grants
//! - Token revocation and introspection
//! - Application registration with quotas and an approval workflow
//! - A per-route guard that lets third-party bearer tokens reach scoped API
//!   routes alongside first-party sessions
//! - A WebSocket gateway delivering platform events to applications
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core entities, catalogs and repository traits
//! - **Application Layer**: Registry, token ledger, protocol and guard services
//! - **Infrastructure Layer**: PostgreSQL repositories, Redis, metrics
//! - **Presentation Layer**: HTTP handlers, middleware and WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! oauth_server/
//! +-- config/        Configuration management
//! +-- domain/        Domain entities, value objects, and traits
//! +-- application/   Application services and DTOs
//! +-- infrastructure/ Database, Redis and metrics
//! +-- presentation/  HTTP routes and WebSocket handlers
//! +-- shared/        Common utilities (errors, credential generation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
