//! WebSocket Connection Handler
//!
//! Upgrades `/gateway` requests and runs one task per connection.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{stream::SplitStream, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::messages::{ClientFrame, ServerFrame};
use crate::startup::AppState;

pub const WEBSOCKET_ID_HEADER: &str = "x-websocket-id";

/// Time allowed for queued frames to flush before the socket is dropped.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    #[serde(rename = "websocketId", alias = "websocket_id")]
    pub websocket_id: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
) -> Response {
    let handshake_id = query.websocket_id.or_else(|| {
        headers
            .get(WEBSOCKET_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    });
    let limits = state.settings.websocket.clone();

    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state, handshake_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, handshake_id: Option<String>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize gateway frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    let websocket_id = match handshake_id {
        Some(id) => Some(id),
        None => {
            let wait = Duration::from_secs(state.settings.websocket.handshake_timeout_secs);
            match timeout(wait, wait_for_auth_frame(&mut stream)).await {
                Ok(id) => id,
                Err(_) => {
                    tracing::debug!("Gateway handshake timed out");
                    None
                }
            }
        }
    };

    let handle = match state.gateway.connect(websocket_id.as_deref(), tx.clone()).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(code = e.code(), "Gateway connection refused");
            let _ = tx.send(e.to_frame());
            drop(tx);
            finish(sender_task).await;
            return;
        }
    };
    drop(tx);

    loop {
        tokio::select! {
            _ = handle.evicted() => break,
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let reply = match serde_json::from_str::<ClientFrame>(text.as_str()) {
                        Ok(frame) => state.gateway.handle_frame(&handle, frame),
                        Err(e) => ServerFrame::error("invalid_frame", e.to_string()),
                    };
                    if !handle.send(reply) {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %handle.connection_id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    }

    state.gateway.disconnect(&handle);
    drop(handle);
    finish(sender_task).await;
}

/// Read frames until an `auth` frame arrives. Any other frame fails the
/// handshake.
async fn wait_for_auth_frame(stream: &mut SplitStream<WebSocket>) -> Option<String> {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                return match serde_json::from_str::<ClientFrame>(text.as_str()) {
                    Ok(ClientFrame::Auth(auth)) => Some(auth.websocket_id),
                    _ => None,
                };
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

/// Let queued frames flush; abort if something still holds the channel open.
async fn finish(mut sender_task: JoinHandle<()>) {
    if timeout(CLOSE_GRACE, &mut sender_task).await.is_err() {
        sender_task.abort();
    }
}
