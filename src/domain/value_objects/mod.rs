//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **ScopeDefinition**: one entry of the compiled-in scope catalog
//! - **Gateway events**: event names and the scope each one requires

pub mod gateway_event;
mod scope;

pub use scope::*;
