//! # PR Hub Server
//!
//! Main binary. `serve` runs the REST API (with the Telegram webhook) in a
//! single process; `migrate` and `create-admin` are one-shot maintenance
//! commands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use prhub_api::{AppState, build_router};
use prhub_common::{config::AppConfig, ids};
use prhub_db::{Database, repository::users, storage::StorageClient};
use prhub_telegram::BotClient;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "prhub")]
#[command(about = "PR Hub - volunteer and task management for a student PR department", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Apply pending database migrations and exit
    Migrate,

    /// Create an approved VP4PR account with a password
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long, env = "PRHUB_ADMIN_PASSWORD")]
        password: String,
        #[arg(long)]
        full_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = prhub_common::config::init()?;

    // Initialize tracing (structured logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prhub=debug,tower_http=debug".into()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => {
            let db = Database::connect(config).await?;
            db.migrate().await
        }
        Commands::CreateAdmin {
            username,
            password,
            full_name,
        } => create_admin(config, &username, &password, &full_name).await,
    }
}

async fn serve(config: &'static AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting PR Hub v{}", env!("CARGO_PKG_VERSION"));

    // Connect to databases
    let db = Database::connect(config).await?;

    // Run migrations
    db.migrate().await?;

    // === Object Storage (MinIO / S3) ===
    let storage = StorageClient::new(&config.storage)?;
    storage.ensure_bucket().await?;
    tracing::info!("Object storage ready (bucket: {})", storage.bucket());

    // === Telegram bot ===
    let telegram = if config.telegram.enabled() {
        let bot = BotClient::new(&config.telegram.api_base, config.telegram.bot_token.clone())?;
        let webhook_url = format!(
            "{}/api/v1/telegram/webhook",
            config.server.public_url.trim_end_matches('/')
        );
        // The API still serves without a webhook; only bot commands stop working.
        match bot.set_webhook(&webhook_url, &config.telegram.webhook_secret).await {
            Ok(_) => tracing::info!("Telegram webhook registered at {webhook_url}"),
            Err(e) => tracing::warn!("Failed to register Telegram webhook: {e}"),
        }
        if config.telegram.webhook_secret.is_empty() {
            tracing::warn!("telegram.webhook_secret is empty; incoming updates will be rejected");
        }
        Some(bot)
    } else {
        tracing::warn!("Telegram bot token not configured; Telegram features disabled");
        None
    };

    // === REST API Server ===
    let router = build_router(AppState::new(db, storage, telegram));
    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid server.host")?,
        config.server.port,
    );

    tracing::info!("REST API listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn create_admin(
    config: &'static AppConfig,
    username: &str,
    password: &str,
    full_name: &str,
) -> anyhow::Result<()> {
    if username.trim().is_empty() || full_name.trim().is_empty() {
        anyhow::bail!("username and full name must not be empty");
    }
    if password.len() < 8 {
        anyhow::bail!("password must be at least 8 characters");
    }

    let db = Database::connect(config).await?;
    db.migrate().await?;

    let hash = prhub_api::auth::hash_password(password)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
    let user = users::create_admin(
        &db.pg,
        ids::generate_id(),
        username.trim(),
        full_name.trim(),
        &hash,
    )
    .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "Admin account created");
    Ok(())
}
