//! WebSocket Gateway
//!
//! Real-time delivery of platform events to connected applications.

pub mod gateway;
pub mod handler;
pub mod messages;
pub mod registry;

pub use gateway::{DomainEvent, Gateway, GatewayError};
pub use handler::ws_handler;
pub use messages::{ClientFrame, ServerFrame};
pub use registry::{ConnectionHandle, ConnectionRegistry, InMemoryConnectionRegistry};
