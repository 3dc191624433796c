//! Relay gateway client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p relay-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use std::sync::Arc;

use async_trait::async_trait;
use relay_common::{try_init_tracing, AppConfig};
use relay_core::protocol::Intents;
use relay_core::traits::{EventHandler, SessionStore};
use relay_db::{PgOutgoingMessageStore, PgSessionStore};
use relay_gateway::{ConnectionConfig, GatewayConnection, Outbox, RateLimiter, RestClient, Supervisor};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    // Run the client
    if let Err(e) = run().await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting relay gateway client...");

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(env = ?config.app.env, "Configuration loaded");

    // Database
    info!("Connecting to PostgreSQL...");
    let pool = relay_db::create_pool(&config.database).await?;
    relay_db::run_migrations(&pool).await?;
    info!("PostgreSQL connection established");

    let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
    let outgoing = Arc::new(PgOutgoingMessageStore::new(pool));
    let outbox = Arc::new(Outbox::new(outgoing));

    let shutdown = CancellationToken::new();

    // REST client behind the shared rate limiter
    let limiter = Arc::new(RateLimiter::new(shutdown.clone()));
    let rest = Arc::new(RestClient::new(
        &config.bot.api_base_url,
        &config.bot.token,
        limiter,
    )?);

    let connection = Arc::new(GatewayConnection::new(
        ConnectionConfig {
            token: config.bot.token.clone(),
            intents: Intents::DEFAULT,
            gateway_url: config.bot.gateway_url.clone(),
            client_name: config.app.name.clone(),
        },
        rest,
        sessions,
        outbox,
        Arc::new(LoggingHandler),
    ));

    // Cancel everything on ctrl-c
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            trigger.cancel();
        }
    });

    Supervisor::new(connection).run(shutdown).await;

    info!("Gateway client stopped");
    Ok(())
}

/// Event handler that logs dispatched events
struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn on_event(&self, name: &str, _data: &Value) -> anyhow::Result<()> {
        debug!(event = %name, "Event received");
        Ok(())
    }
}
