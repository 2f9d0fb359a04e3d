//! Common test utilities and fixtures for integration tests.
//!
//! # Requirements
//! Integration tests require PostgreSQL (set DATABASE_URL env var).
//! Each test isolates its data behind a unique owner id.

pub mod fixtures;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use uuid::Uuid;

use cardbox_backend::db::Database;
use cardbox_backend::{build_router, AppState};
use study_core::scheduler::get_scheduler;

/// Attach the identity header requests are scoped by.
pub trait WithUser {
    fn with_user(self, owner: &str) -> Self;
}

impl WithUser for axum_test::TestRequest {
    fn with_user(self, owner: &str) -> Self {
        self.add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_str(owner).expect("valid header value"),
        )
    }
}

/// Test context containing database connection and test router.
pub struct TestContext {
    pub db: Arc<Database>,
    app: Router,
}

impl TestContext {
    /// Create a new test context.
    ///
    /// # Panics
    /// Panics if DATABASE_URL is not set or database connection fails.
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

        let db = Database::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        db.run_migrations().await.expect("Failed to run migrations");

        let db = Arc::new(db);
        let state = AppState {
            db: db.clone(),
            scheduler: Arc::from(get_scheduler("standard").expect("standard policy exists")),
        };
        let app = build_router(state);

        Self { db, app }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Unique owner id so concurrent tests never see each other's rows.
    pub fn unique_owner(prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4())
    }

    /// Unique scope name.
    pub fn unique_scope(prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4())
    }

    /// Clean up test data for an owner.
    pub async fn cleanup_owner(&self, owner: &str) {
        let _ = sqlx::query("DELETE FROM reviews WHERE owner = $1")
            .bind(owner)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM schedule_states WHERE owner = $1")
            .bind(owner)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM mastery_states WHERE owner = $1")
            .bind(owner)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM sessions WHERE owner = $1")
            .bind(owner)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM jobs WHERE owner = $1")
            .bind(owner)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM quizzes WHERE owner = $1")
            .bind(owner)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM cards WHERE owner = $1")
            .bind(owner)
            .execute(self.db.pool())
            .await;
    }
}
