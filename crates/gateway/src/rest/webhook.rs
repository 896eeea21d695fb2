//! Webhook endpoints fed by the messaging provider

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use courier_conversations::StatusChange;
use courier_database::{Conversation, MessageRecord, StatusUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::GatewayResult;
use crate::state::GatewayState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiveResponse {
    pub success: bool,
    /// The message had been received before; nothing was broadcast
    pub duplicate: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    /// False when the message already had the requested status
    pub changed: bool,
}

pub fn create_webhook_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/messages", get(list_conversations))
        .route("/receive", post(receive_message))
        .route("/status", post(update_status))
}

/// Every conversation with its messages, oldest first
pub async fn list_conversations(
    State(state): State<Arc<GatewayState>>,
) -> Json<Vec<Conversation>> {
    Json(state.engine.history().await)
}

pub async fn receive_message(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<MessageRecord>, JsonRejection>,
) -> GatewayResult<Json<ReceiveResponse>> {
    let Json(record) = payload?;
    let outcome = state.engine.receive(record).await?;

    Ok(Json(ReceiveResponse {
        success: true,
        duplicate: outcome.is_duplicate(),
    }))
}

pub async fn update_status(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> GatewayResult<Json<StatusResponse>> {
    let Json(update) = payload?;
    let change = state
        .engine
        .set_status(&update.conversation_id, &update.message_id, update.status)
        .await?;

    if let StatusChange::Applied { previous } = change {
        info!(
            conversation_id = %update.conversation_id,
            message_id = %update.message_id,
            from = %previous,
            to = %update.status,
            "status webhook applied"
        );
    }

    Ok(Json(StatusResponse {
        success: true,
        changed: matches!(change, StatusChange::Applied { .. }),
    }))
}
