use std::sync::Arc;

use anyhow::{Context, Result};
use courier_config::AppConfig;
use courier_conversations::{BroadcastHub, SyncEngine};
use courier_database::{prepare_database, run_migrations, SqliteMessageStore};
use courier_gateway::{Engine, GatewayState};
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub hub: BroadcastHub,
    pub engine: Arc<Engine>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = prepare_database(&config.database).await?;
        run_migrations(&db_pool)
            .await
            .context("database migrations failed")?;

        let hub = BroadcastHub::new();
        let store = SqliteMessageStore::new(db_pool.clone());
        let engine = Arc::new(
            SyncEngine::load(store, hub.clone())
                .await
                .context("failed to load conversation history")?,
        );

        info!(
            conversations = engine.aggregator().len().await,
            "sync engine ready"
        );

        Ok(Self {
            db_pool,
            hub,
            engine,
        })
    }

    pub fn gateway_state(&self, config: &AppConfig) -> GatewayState {
        GatewayState::new(self.engine.clone(), config.cors.clone())
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
