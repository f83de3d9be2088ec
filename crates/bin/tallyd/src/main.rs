//! # tallyd — visitor counter daemon
//!
//! Composition root that wires the counter store, service and HTTP adapter
//! together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise tracing
//! - Build the selected counter store once (Azure Table client or `SQLite` pool)
//! - Construct the counter service, injecting the store via its port trait
//! - Build the axum router, bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use tally_adapter_http_axum::router;
use tally_adapter_http_axum::state::AppState;
use tally_adapter_storage_sqlite_sqlx::SqliteCounterTable;
use tally_app::ports::CounterTable;
use tally_app::services::counter_service::CounterService;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, StoreBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    tracing::debug!(?config, "configuration loaded");

    match config.store.backend {
        StoreBackend::Azure => {
            let table = config.azure_table().build()?;
            serve(&config, table).await
        }
        StoreBackend::Sqlite => {
            let db = config.sqlite_database().build().await?;
            let table = SqliteCounterTable::new(db.pool().clone());
            serve(&config, table).await
        }
    }
}

async fn serve<T>(config: &Config, table: T) -> Result<(), Box<dyn std::error::Error>>
where
    T: CounterTable + Send + Sync + 'static,
{
    let retry = config.retry_policy();
    let service = CounterService::new(table).with_retry_policy(retry);
    let cors = router::cors_layer(&config.http.cors_allowed_origins)?;
    let app = router::build(AppState::new(service), cors);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        %bind_addr,
        backend = ?config.store.backend,
        max_attempts = retry.max_attempts(),
        "tallyd listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("tallyd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
