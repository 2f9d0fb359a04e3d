pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use study_core::scheduler::{get_scheduler, ReviewScheduler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub scheduler: Arc<dyn ReviewScheduler>,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Card routes
        .route("/api/scopes/:scope/cards", get(routes::cards::list))
        .route("/api/cards/:card_id", delete(routes::cards::remove))
        // Long-horizon review routes
        .route("/api/review/due/:scope", get(routes::review::due))
        .route("/api/review", post(routes::review::submit))
        // Mastery session routes
        .route("/api/mastery/start", post(routes::mastery::start))
        .route("/api/mastery/reset", post(routes::mastery::reset))
        .route("/api/mastery/:session_id", get(routes::mastery::current))
        .route(
            "/api/mastery/:session_id/review",
            post(routes::mastery::review),
        )
        .route("/api/mastery/:session_id/end", post(routes::mastery::end))
        // Job routes
        .route("/api/jobs/flashcards", post(routes::jobs::create_flashcards))
        .route("/api/jobs/quizzes", post(routes::jobs::create_quiz))
        .route("/api/jobs/:job_id", get(routes::jobs::status))
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
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

    let scheduler = get_scheduler(&config.scheduler)
        .ok_or_else(|| anyhow::anyhow!("unknown scheduler policy: {}", config.scheduler))?;
    tracing::info!("Scheduling policy: {}", scheduler.name());

    let state = AppState {
        db: Arc::new(db),
        scheduler: Arc::from(scheduler),
    };

    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
