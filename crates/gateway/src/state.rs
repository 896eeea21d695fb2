//! Shared application state for the gateway

use std::sync::Arc;

use courier_config::CorsConfig;
use courier_conversations::SyncEngine;
use courier_database::SqliteMessageStore;

/// Engine type served by the gateway
pub type Engine = SyncEngine<SqliteMessageStore>;

/// Shared application state containing all services
#[derive(Clone)]
pub struct GatewayState {
    /// Sync pipeline: store, conversation mirror, and broadcast hub
    pub engine: Arc<Engine>,
    /// Origins allowed to call the API from a browser
    pub cors: CorsConfig,
}

impl GatewayState {
    pub fn new(engine: Arc<Engine>, cors: CorsConfig) -> Self {
        Self { engine, cors }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}
