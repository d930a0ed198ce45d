//! WebSocket Message Types
//!
//! Gateway frames are JSON objects `{"event": <name>, "data": <payload>}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frames sent by a connected application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Handshake fallback when the id was not in the query or headers
    Auth(AuthPayload),
    Subscribe(EventsPayload),
    Unsubscribe(EventsPayload),
    ListSubscriptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(alias = "websocket_id")]
    pub websocket_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventsPayload {
    #[serde(default)]
    pub events: Vec<String>,
}

/// Frames sent to a connected application.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    Connected(ConnectedPayload),
    Subscribed(SubscribedPayload),
    Unsubscribed(UnsubscribedPayload),
    Subscriptions(SubscriptionsPayload),
    Event(EventPayload),
    Error(ErrorPayload),
}

impl ServerFrame {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            code,
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub application_id: Uuid,
    pub name: String,
    pub scopes: Vec<String>,
    /// Events this application's scopes allow it to subscribe to
    pub available_events: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubscribedPayload {
    pub subscribed: Vec<String>,
    pub rejected: Vec<RejectedEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEvent {
    pub event: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribedPayload {
    pub unsubscribed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionsPayload {
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPayload {
    pub name: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}
