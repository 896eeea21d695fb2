//! REST API endpoints for the gateway

pub mod health;
pub mod webhook;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::GatewayState;

/// Create all REST API routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .nest("/webhook", webhook::create_webhook_routes())
}

pub use health::HealthResponse;
pub use webhook::{ReceiveResponse, StatusResponse};
