//! Generation worker process.
//!
//! Run any number of these against the same database; the claim query
//! keeps them from stepping on each other.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardbox_backend::config::Config;
use cardbox_backend::db::Database;
use cardbox_backend::services::generation::HttpGenerationClient;
use cardbox_backend::services::worker::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    let client = Arc::new(HttpGenerationClient::new(config.generation_url.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let worker = Worker::new(
        Arc::new(db),
        client.clone(),
        client,
        Duration::from_secs(config.worker_poll_secs),
        shutdown_rx,
    );
    worker.run().await;

    Ok(())
}
