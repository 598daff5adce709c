//! Libris Server - Library Reservation Server
//!
//! REST API server for book reservations.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libris_server::{
    api,
    config::{AppConfig, StoreBackend},
    repository::{EntityStore, MemoryStore, PgStore, Repository, RetryPolicy},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("libris_server={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Libris Server v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn EntityStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations completed");

            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let repository = Repository::new(store, RetryPolicy::from(&config.reservations));
    let app = api::create_router(AppState::new(config, repository));

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
