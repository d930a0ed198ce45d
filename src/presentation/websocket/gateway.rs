//! WebSocket Gateway
//!
//! Authenticates application connections by `websocketId`, manages their
//! event subscriptions and fans domain events out to subscribers.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{
    ClientFrame, ConnectedPayload, EventPayload, RejectedEvent, ServerFrame, SubscribedPayload,
    SubscriptionsPayload, UnsubscribedPayload,
};
use super::registry::{ConnectionHandle, ConnectionRegistry};
use crate::application::services::{ApplicationService, RegistryError};
use crate::domain::value_objects::gateway_event;
use crate::infrastructure::metrics;

/// Something that happened on the platform, e.g. `user.followed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

impl DomainEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Reasons a connection is refused.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("websocketId is required")]
    MissingId,

    #[error("websocketId is not a valid identifier")]
    MalformedId,

    #[error("Unknown websocketId")]
    UnknownApplication,

    #[error("Application is not active")]
    ApplicationInactive,

    #[error("Internal error")]
    Internal(#[from] RegistryError),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingId | Self::MalformedId => "invalid_websocket_id",
            Self::UnknownApplication => "unknown_application",
            Self::ApplicationInactive => "application_inactive",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn to_frame(&self) -> ServerFrame {
        ServerFrame::error(self.code(), self.to_string())
    }
}

pub struct Gateway {
    registry: Arc<dyn ConnectionRegistry>,
    applications: Arc<ApplicationService>,
}

impl Gateway {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, applications: Arc<ApplicationService>) -> Self {
        Self {
            registry,
            applications,
        }
    }

    pub fn parse_websocket_id(raw: Option<&str>) -> Result<Uuid, GatewayError> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(GatewayError::MissingId)?;
        Uuid::parse_str(raw).map_err(|_| GatewayError::MalformedId)
    }

    /// Authenticate and register a connection.
    ///
    /// An existing connection for the same application is sent an error
    /// frame and closed. The `connected` frame is queued on success.
    pub async fn connect(
        &self,
        websocket_id: Option<&str>,
        sender: mpsc::UnboundedSender<ServerFrame>,
    ) -> Result<Arc<ConnectionHandle>, GatewayError> {
        let websocket_id = Self::parse_websocket_id(websocket_id)?;
        let application = self
            .applications
            .find_by_websocket_id(websocket_id)
            .await?
            .ok_or(GatewayError::UnknownApplication)?;
        if !application.is_active() {
            return Err(GatewayError::ApplicationInactive);
        }

        let handle = Arc::new(ConnectionHandle::new(
            websocket_id,
            application.id,
            application.scopes.clone(),
            sender,
        ));

        if let Some(previous) = self.registry.register(handle.clone()) {
            tracing::info!(
                application_id = %application.id,
                evicted = %previous.connection_id,
                "Replacing existing gateway connection"
            );
            previous.evict(ServerFrame::error(
                "connection_replaced",
                "A newer connection for this application was opened",
            ));
        }
        metrics::set_gateway_connections(self.registry.len());

        handle.send(ServerFrame::Connected(ConnectedPayload {
            application_id: application.id,
            name: application.name,
            available_events: gateway_event::events_for_scopes(&application.scopes),
            scopes: application.scopes,
        }));

        tracing::info!(
            application_id = %handle.application_id,
            connection_id = %handle.connection_id,
            "Gateway connection established"
        );
        Ok(handle)
    }

    /// Reply to a frame from an authenticated connection.
    pub fn handle_frame(&self, handle: &ConnectionHandle, frame: ClientFrame) -> ServerFrame {
        match frame {
            ClientFrame::Auth(_) => {
                ServerFrame::error("already_authenticated", "Connection is already authenticated")
            }
            ClientFrame::Subscribe(payload) => self.subscribe(handle, payload.events),
            ClientFrame::Unsubscribe(payload) => self.unsubscribe(handle, payload.events),
            ClientFrame::ListSubscriptions => self.list_subscriptions(handle),
        }
    }

    /// Subscribe to every event the connection's scopes allow; report the rest.
    pub fn subscribe(&self, handle: &ConnectionHandle, events: Vec<String>) -> ServerFrame {
        let mut result = SubscribedPayload::default();

        for event in events {
            if result.subscribed.contains(&event) {
                continue;
            }
            let rejection = if !gateway_event::is_well_formed(&event) {
                Some("invalid event name".to_string())
            } else {
                match gateway_event::required_scope(&event) {
                    None => Some("unknown event".to_string()),
                    Some(scope) if !handle.has_scope(scope) => {
                        Some(format!("requires scope {}", scope))
                    }
                    Some(_) => None,
                }
            };

            match rejection {
                Some(reason) => result.rejected.push(RejectedEvent { event, reason }),
                None => result.subscribed.push(event),
            }
        }

        handle.subscribe(&result.subscribed);
        tracing::debug!(
            connection_id = %handle.connection_id,
            subscribed = result.subscribed.len(),
            rejected = result.rejected.len(),
            "Subscription request"
        );
        ServerFrame::Subscribed(result)
    }

    pub fn unsubscribe(&self, handle: &ConnectionHandle, events: Vec<String>) -> ServerFrame {
        ServerFrame::Unsubscribed(UnsubscribedPayload {
            unsubscribed: handle.unsubscribe(&events),
        })
    }

    pub fn list_subscriptions(&self, handle: &ConnectionHandle) -> ServerFrame {
        ServerFrame::Subscriptions(SubscriptionsPayload {
            events: handle.subscriptions(),
        })
    }

    /// Deliver `event` to every subscribed connection. At most once, no replay.
    /// Returns the number of connections it was queued for.
    pub fn publish(&self, event: &DomainEvent) -> usize {
        let frame = ServerFrame::Event(EventPayload {
            name: event.name.clone(),
            payload: event.payload.clone(),
            timestamp: Utc::now(),
        });

        let delivered = self
            .registry
            .connections()
            .iter()
            .filter(|handle| handle.is_subscribed(&event.name))
            .filter(|handle| handle.send(frame.clone()))
            .count();

        metrics::record_event_delivered(&event.name, delivered);
        delivered
    }

    /// Forget a connection that has closed.
    pub fn disconnect(&self, handle: &ConnectionHandle) {
        if self.registry.unregister(handle.websocket_id, handle.connection_id) {
            metrics::set_gateway_connections(self.registry.len());
            tracing::info!(
                application_id = %handle.application_id,
                connection_id = %handle.connection_id,
                "Gateway connection closed"
            );
        }
    }

    /// Close the live connection of an application that was suspended or deleted.
    pub fn disconnect_application(&self, websocket_id: Uuid) -> bool {
        let Some(handle) = self.registry.get(websocket_id) else {
            return false;
        };
        if !self.registry.unregister(websocket_id, handle.connection_id) {
            return false;
        }
        handle.evict(ServerFrame::error(
            "application_unavailable",
            "The application is no longer active",
        ));
        metrics::set_gateway_connections(self.registry.len());
        tracing::info!(application_id = %handle.application_id, "Gateway connection revoked");
        true
    }

    /// Apply narrowed application scopes to its live connection. Events it
    /// may no longer receive are unsubscribed and reported to the client.
    pub fn restrict_application(&self, websocket_id: Uuid, scopes: &[String]) {
        let Some(handle) = self.registry.get(websocket_id) else {
            return;
        };
        let dropped = handle.restrict(scopes.to_vec(), |event| {
            gateway_event::required_scope(event)
                .is_some_and(|scope| scopes.iter().any(|s| s == scope))
        });
        if !dropped.is_empty() {
            tracing::info!(
                application_id = %handle.application_id,
                dropped = dropped.len(),
                "Gateway subscriptions narrowed"
            );
            handle.send(ServerFrame::Unsubscribed(UnsubscribedPayload {
                unsubscribed: dropped,
            }));
        }
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }
}
