//! HTTP and WebSocket client used by `send` and `watch`.

use std::time::Duration;

use anyhow::{Context, Result};
use courier_conversations::{ConversationViewer, HubEvent, SubscriberId, ViewerUpdate};
use courier_database::{Conversation, MessageRecord};
use courier_gateway::rest::ReceiveResponse;
use courier_gateway::{ClientEvent, ServerEvent, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub struct CourierClient {
    http: reqwest::Client,
    base_url: String,
}

impl CourierClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn send_message(&self, record: &MessageRecord) -> Result<ReceiveResponse> {
        let url = format!("{}/webhook/receive", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(record)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("server rejected message ({status}): {body}");
        }

        response
            .json::<ReceiveResponse>()
            .await
            .context("invalid receive response")
    }

    pub async fn history(&self) -> Result<Vec<Conversation>> {
        let url = format!("{}/webhook/messages", self.base_url);
        self.http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?
            .error_for_status()
            .context("history request failed")?
            .json()
            .await
            .context("invalid history response")
    }

    pub fn websocket_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/ws")
    }
}

type EventSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Print live events until interrupted, reconnecting when the stream drops
pub async fn watch(
    client: CourierClient,
    focus: Option<String>,
    typing_timeout: Duration,
) -> Result<()> {
    let mut viewer = ConversationViewer::new(Vec::new(), typing_timeout);
    if let Some(conversation_id) = focus {
        viewer.focus(conversation_id).await;
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut connected = false;

    loop {
        tokio::select! {
            result = follow(&client, &viewer, &mut connected) => {
                match result {
                    Err(e) if !connected => return Err(e),
                    Err(e) => warn!(error = %e, "event stream ended"),
                    Ok(()) => info!("event stream closed"),
                }
            }
            _ = &mut shutdown => {
                info!("stopped watching");
                return Ok(());
            }
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Subscribe to `/ws`, then load history into the viewer.
///
/// Events published after the subscription are queued on the socket, so none
/// fall between the history snapshot and the live stream.
async fn open_stream(client: &CourierClient, viewer: &ConversationViewer) -> Result<EventSocket> {
    let url = client.websocket_url();
    let (mut socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    let subscriber_id = await_hello(&mut socket).await?;
    info!(subscriber_id, "connected to event stream");

    viewer.reload(client.history().await?).await;
    Ok(socket)
}

async fn await_hello(socket: &mut EventSocket) -> Result<SubscriberId> {
    while let Some(frame) = socket.next().await {
        if let Message::Text(text) = frame.context("websocket receive failed")? {
            if let Some(ServerFrame::Connection(ServerEvent::Hello { subscriber_id })) =
                ServerFrame::decode(&text)
            {
                return Ok(subscriber_id);
            }
            debug!(frame = %text, "frame before hello ignored");
        }
    }
    anyhow::bail!("event stream closed before it was ready")
}

async fn follow(
    client: &CourierClient,
    viewer: &ConversationViewer,
    connected: &mut bool,
) -> Result<()> {
    let socket = open_stream(client, viewer).await?;
    if !*connected {
        print_history(&viewer.conversations().await);
        *connected = true;
    }
    let (mut sink, mut stream) = socket.split();

    let mut typing_changes = viewer.typing().changes();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut was_typing = false;

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(frame) = frame else {
                    return Ok(());
                };
                match frame.context("websocket receive failed")? {
                    Message::Text(text) => handle_frame(viewer, &text).await,
                    Message::Close(_) => return Ok(()),
                    _ => {}
                }
            }
            Ok(()) = typing_changes.changed() => {
                let typing = viewer.is_typing().await;
                if typing != was_typing {
                    if let Some(conversation_id) = viewer.focused() {
                        if typing {
                            println!("[{conversation_id}] typing...");
                        } else {
                            println!("[{conversation_id}] stopped typing");
                        }
                    }
                    was_typing = typing;
                }
            }
            _ = heartbeat.tick() => {
                let ping = serde_json::to_string(&ClientEvent::Ping)?;
                sink.send(Message::Text(ping)).await.context("websocket send failed")?;
            }
        }
    }
}

async fn handle_frame(viewer: &ConversationViewer, text: &str) {
    match ServerFrame::decode(text) {
        Some(ServerFrame::Hub(event)) => {
            let update = viewer.handle_event(&event).await;
            if let Some(line) = describe(&event, update) {
                println!("{line}");
            }
        }
        Some(ServerFrame::Connection(ServerEvent::Hello { subscriber_id })) => {
            debug!(subscriber_id, "unexpected hello");
        }
        Some(ServerFrame::Connection(ServerEvent::Error { message })) => {
            warn!(%message, "server reported an error");
        }
        Some(ServerFrame::Connection(ServerEvent::Pong)) => {}
        None => debug!(frame = %text, "ignoring unknown frame"),
    }
}

fn describe(event: &HubEvent, update: ViewerUpdate) -> Option<String> {
    match (event, update) {
        (HubEvent::NewMessage(record), ViewerUpdate::MessageAdded) => Some(format!(
            "[{}] {} {}: {}",
            record.conversation_id(),
            record.message.direction,
            record.message_id(),
            record.message.content
        )),
        (HubEvent::StatusUpdated(update), ViewerUpdate::StatusChanged) => Some(format!(
            "[{}] {} is now {}",
            update.conversation_id, update.message_id, update.status
        )),
        _ => None,
    }
}

fn print_history(conversations: &[Conversation]) {
    println!("=== {} conversations ===", conversations.len());
    for conversation in conversations {
        let last = conversation
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or("");
        println!(
            "{} {} ({} messages) {}",
            conversation.conversation_id,
            conversation.name,
            conversation.messages.len(),
            last
        );
    }
}
