//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`] or [`set`].
pub fn get() -> &'static AppConfig {
    CONFIG.get().expect("Config not initialized. Call prhub_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.public_url", "http://localhost:8080")?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 2)?
        .set_default("auth.access_token_ttl_secs", 900)? // 15 min
        .set_default("auth.refresh_token_ttl_secs", 2_592_000)? // 30 days
        .set_default("auth.qr_session_ttl_secs", 300)?
        .set_default("auth.telegram_auth_max_age_secs", 86_400)?
        .set_default("storage.endpoint", "http://localhost:9000")?
        .set_default("storage.bucket", "prhub")?
        .set_default("storage.access_key", "")?
        .set_default("storage.secret_key", "")?
        .set_default("storage.region", "us-east-1")?
        .set_default("telegram.bot_token", "")?
        .set_default("telegram.bot_username", "")?
        .set_default("telegram.webhook_secret", "")?
        .set_default("telegram.api_base", "https://api.telegram.org")?
        .set_default("limits.max_file_size_bytes", 104_857_600)? // 100MB default
        .set_default("limits.max_page_size", 100)?
        .set_default("limits.login_attempts_per_minute", 10)?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (PRHUB__SERVER__HOST, PRHUB__DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("PRHUB")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

/// Install an already-built configuration (embedding, tests).
///
/// The first installed configuration wins; later calls return it unchanged.
pub fn set(config: AppConfig) -> &'static AppConfig {
    CONFIG.get_or_init(|| config)
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub telegram: TelegramConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to register the Telegram webhook.
    pub public_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Redis connection URL. Optional; without it login rate limiting is off.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret (HS256) - should be 256+ bits of entropy
    pub jwt_secret: String,
    /// Access token TTL in seconds
    pub access_token_ttl_secs: u64,
    /// Refresh token TTL in seconds
    pub refresh_token_ttl_secs: u64,
    /// How long a QR login session stays confirmable
    pub qr_session_ttl_secs: u64,
    /// Maximum age of Telegram login widget data
    pub telegram_auth_max_age_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// S3 endpoint URL (e.g., http://localhost:9000 for MinIO).
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Public CDN base for permanent files; presigned URLs are used when unset.
    pub public_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Bot API token. Empty disables every Telegram feature.
    pub bot_token: String,
    /// Bot username without `@`, used for deep links.
    pub bot_username: String,
    /// Forum supergroup where task topics are created.
    pub department_chat_id: Option<i64>,
    /// Value Telegram echoes in `X-Telegram-Bot-Api-Secret-Token`.
    pub webhook_secret: String,
    pub api_base: String,
}

impl TelegramConfig {
    pub fn enabled(&self) -> bool {
        !self.bot_token.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub max_file_size_bytes: u64,
    pub max_page_size: i64,
    pub login_attempts_per_minute: u32,
}
