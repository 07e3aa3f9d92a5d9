//! # prhub-telegram
//!
//! Telegram integration for PR Hub.
//!
//! - **Bot client** (`client.rs`): outbound Bot API calls (messages, forum
//!   topics, webhook registration).
//! - **Login verification** (`login.rs`): checks Login Widget payloads signed
//!   with the bot token.
//! - **Commands** (`commands.rs`): parses `/start`, `/help` and `/me` from
//!   incoming updates, including QR login deep links.
//! - **Types** (`types.rs`): the subset of Bot API objects PR Hub reads.

pub mod client;
pub mod commands;
pub mod error;
pub mod login;
pub mod types;

pub use client::BotClient;
pub use commands::{Command, parse_command};
pub use error::TelegramError;
pub use login::verify_login;
