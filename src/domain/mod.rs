//! # Domain Layer
//!
//! The domain layer contains the core rules of the authorization server.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Applications, authorization codes, tokens, repository traits
//! - **value_objects**: The scope catalog table and gateway event table
//! - **services**: Scope catalog lookups
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Catalogs are data, not control flow

pub mod entities;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use services::*;
pub use value_objects::*;
