//! Live event stream for connected clients

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use courier_conversations::HubEvent;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::GatewayState;

/// Events a client may send
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Heartbeat to keep the connection alive
    Ping,
    /// The client's user is typing in this conversation
    Typing(String),
}

/// Connection-level events sent alongside hub events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame after the subscription is registered
    Hello { subscriber_id: u64 },
    Pong,
    Error { message: String },
}

/// Create all WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(websocket_handler))
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut ws_sender, mut receiver) = socket.split();
    let subscription = state.engine.subscribe().await;
    let (subscriber_id, mut events) = subscription.into_parts();
    info!(subscriber_id, "websocket client connected");

    // Greet before any hub event can be forwarded.
    if let Ok(hello) = serde_json::to_string(&ServerEvent::Hello { subscriber_id }) {
        if ws_sender.send(Message::Text(hello)).await.is_err() {
            state.engine.unsubscribe(subscriber_id).await;
            return;
        }
    }

    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(32);
    let sender_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(event) = events.recv() => serde_json::to_string(&event),
                Some(event) = out_rx.recv() => serde_json::to_string(&event),
                else => break,
            };

            let text = match frame {
                Ok(text) => text,
                Err(e) => {
                    warn!(subscriber_id, error = %e, "failed to encode websocket frame");
                    continue;
                }
            };

            if let Err(e) = ws_sender.send(Message::Text(text)).await {
                debug!(subscriber_id, error = %e, "websocket send failed");
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::Ping) => {
                    let _ = out_tx.send(ServerEvent::Pong).await;
                }
                Ok(ClientEvent::Typing(conversation_id)) => {
                    state
                        .engine
                        .signal_typing(subscriber_id, &conversation_id)
                        .await;
                }
                Err(e) => {
                    warn!(subscriber_id, error = %e, "invalid client event");
                    let _ = out_tx
                        .send(ServerEvent::Error {
                            message: "Invalid event format".to_string(),
                        })
                        .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!(subscriber_id, error = %e, "websocket receive failed");
                break;
            }
            _ => {}
        }
    }

    state.engine.unsubscribe(subscriber_id).await;
    sender_task.abort();
    info!(subscriber_id, "websocket client disconnected");
}

/// Any frame the server pushes over `/ws`
#[derive(Debug, Clone)]
pub enum ServerFrame {
    Hub(HubEvent),
    Connection(ServerEvent),
}

impl ServerFrame {
    pub fn decode(text: &str) -> Option<Self> {
        if let Ok(event) = serde_json::from_str::<HubEvent>(text) {
            return Some(ServerFrame::Hub(event));
        }
        serde_json::from_str::<ServerEvent>(text)
            .ok()
            .map(ServerFrame::Connection)
    }
}
