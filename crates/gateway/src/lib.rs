//! # Courier Gateway Crate
//!
//! HTTP and WebSocket surface of the Courier sync server. Webhook endpoints
//! feed the sync pipeline; `/ws` streams hub events to connected clients.
//!
//! ## Architecture
//!
//! - **REST**: webhook ingest, grouped history, and health endpoints
//! - **WebSocket**: live event stream and typing signals
//! - **State**: the shared sync engine and CORS settings
//! - **Middleware**: CORS and request tracing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use courier_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::new(engine, config.cors.clone());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use state::{Engine, GatewayState};
pub use websocket::{ClientEvent, ServerEvent, ServerFrame};

pub use create_router as build_router;

use axum::Router;
use std::sync::Arc;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let cors = middleware::create_cors_middleware(&state.cors);
    let arc_state = Arc::new(state);

    Router::new()
        .merge(rest::create_rest_routes().with_state(arc_state.clone()))
        .merge(websocket::create_websocket_routes().with_state(arc_state))
        .layer(cors)
        .layer(middleware::create_trace_middleware())
}
