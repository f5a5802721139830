//! eskit - Event-Sourced Storage Toolkit
//!
//! Thin HTTP collaborator over the library: event streams, CRUD
//! projections, the schema registry and consumer checkpoints behind a
//! JSON API. Storage is picked by `DB_URI` (`inmemory://` or a Postgres
//! DSN); the server binds `LISTEN_ADDR`.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eskit::api::{create_router, AppState};
use eskit::consumer_store::{InMemoryConsumerStore, SqlConsumerStore};
use eskit::event_store::{InMemoryStore, SqlStore, INMEMORY_URI};
use eskit::{retry, Config};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eskit=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wire storage backends from the configured `DB_URI`
async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    if config.db_uri == INMEMORY_URI {
        tracing::info!("using in-memory storage");
        return Ok(AppState::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryConsumerStore::new()),
        ));
    }

    tracing::info!("connecting to database...");
    let pool = retry::retry_normal(|| async {
        PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.db_uri)
            .await
    })
    .await?;

    SqlStore::migrate(&pool).await?;
    SqlConsumerStore::migrate(&pool).await?;
    tracing::info!("database connected and migrated");

    Ok(AppState::new(
        Arc::new(SqlStore::new(pool.clone())),
        Arc::new(SqlConsumerStore::new(pool)),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = config.listen_addr.parse()?;

    tracing::info!("Starting eskit server");

    let state = build_state(&config).await?;
    let app = create_router(state).layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
