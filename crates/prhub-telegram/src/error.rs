//! Telegram-specific error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    // ── Bot API ─────────────────────────────────────────────────────────────

    #[error("Bot API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Built only through `From`, which strips the request URL: it carries
    /// the bot token.
    #[error("HTTP error talking to the Bot API: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Bot API returned an unexpected response: {0}")]
    Protocol(String),

    #[error("Invalid Bot API base URL: {0}")]
    UrlParse(#[from] url::ParseError),

    // ── Login widget ────────────────────────────────────────────────────────

    #[error("Telegram login signature is invalid")]
    InvalidSignature,

    #[error("Telegram login data is too old")]
    Stale,
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}
