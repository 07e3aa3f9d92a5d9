//! # prhub-db
//!
//! Persistence layer for PR Hub. Manages connections to:
//! - **PostgreSQL**: users, tasks, equipment, moderation, files (all relational data)
//! - **Redis** (optional): login rate limiting
//! - **S3 / MinIO**: uploaded media, see [`storage`]

pub mod postgres;
pub mod redis_pool;
pub mod repository;
pub mod storage;

use anyhow::{Context, Result};
use sqlx::PgPool;

/// Shared database state passed through Axum extractors.
#[derive(Clone)]
pub struct Database {
    pub pg: PgPool,
    pub redis: Option<redis::aio::ConnectionManager>,
}

impl Database {
    /// Connect to PostgreSQL and, when configured, Redis.
    pub async fn connect(config: &prhub_common::config::AppConfig) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");
        let pg = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        tracing::info!("Connected to PostgreSQL");

        let redis = match config.redis.url.as_deref() {
            Some(url) if !url.is_empty() => {
                tracing::info!("Connecting to Redis...");
                let client = redis::Client::open(url).context("Invalid Redis URL")?;
                let manager = redis::aio::ConnectionManager::new(client)
                    .await
                    .context("Failed to connect to Redis")?;
                tracing::info!("Connected to Redis");
                Some(manager)
            }
            _ => {
                tracing::warn!("Redis not configured; login rate limiting disabled");
                None
            }
        };

        Ok(Self { pg, redis })
    }

    /// Wrap an existing pool (tests, tooling). Redis stays disabled.
    pub fn from_pool(pg: PgPool) -> Self {
        Self { pg, redis: None }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Migrations complete");
        Ok(())
    }
}
