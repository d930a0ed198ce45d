//! # Domain Services
//!
//! Domain services encapsulate logic that doesn't naturally belong to a
//! single entity.
//!
//! ## Services
//!
//! - **ScopeCatalog**: lookup and validation over the scope catalog

mod scope_catalog;

pub use scope_catalog::*;
