//! Process configuration collected from the environment at startup.

use anyhow::Context;

/// Runtime configuration shared by the server and worker binaries.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: String,
    /// Scheduling policy name: "standard" or "confidence".
    pub scheduler: String,
    /// Base URL of the generation/retrieval collaborator.
    pub generation_url: String,
    /// Idle poll interval for the worker loop, in seconds.
    pub worker_poll_secs: u64,
}

impl Config {
    /// Read configuration once. Missing DATABASE_URL is fatal; everything
    /// else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        Ok(Self {
            database_url,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()),
            scheduler: std::env::var("SCHEDULER").unwrap_or_else(|_| "standard".to_string()),
            generation_url: std::env::var("GENERATION_URL")
                .unwrap_or_else(|_| "http://localhost:8500".to_string()),
            worker_poll_secs: std::env::var("WORKER_POLL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        })
    }
}
