//! Bot API HTTP client.
//!
//! Every method is a `POST {api_base}/bot{token}/{method}` with a JSON body;
//! the response envelope is unwrapped into `Result<T, TelegramError>`.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::TelegramError;
use crate::types::{ApiResponse, ForumTopic, Message, User};

/// Async client for one bot.
pub struct BotClient {
    http: Client,
    base: String,
    token: String,
}

impl BotClient {
    pub fn new(api_base: &str, token: impl Into<String>) -> Result<Self, TelegramError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("PRHub-Bot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base = Url::parse(api_base)?;
        Ok(Self {
            http,
            base: base.as_str().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// `getMe`: the bot's own account.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({})).await
    }

    /// `sendMessage`, optionally into a forum topic.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        message_thread_id: Option<i64>,
    ) -> Result<Message, TelegramError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(thread) = message_thread_id {
            body["message_thread_id"] = json!(thread);
        }
        self.call("sendMessage", &body).await
    }

    /// `createForumTopic` in a forum supergroup.
    pub async fn create_forum_topic(&self, chat_id: i64, name: &str) -> Result<ForumTopic, TelegramError> {
        self.call("createForumTopic", &json!({ "chat_id": chat_id, "name": name }))
            .await
    }

    /// `setWebhook` with a secret Telegram echoes back on every update.
    pub async fn set_webhook(&self, url: &str, secret_token: &str) -> Result<bool, TelegramError> {
        let mut body = json!({
            "url": url,
            "allowed_updates": ["message"],
        });
        if !secret_token.is_empty() {
            body["secret_token"] = json!(secret_token);
        }
        self.call("setWebhook", &body).await
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, TelegramError> {
        // The URL embeds the token; log the method name only.
        debug!(method, "Bot API call");
        let resp = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;

        // Telegram reports failures inside the envelope, with a 4xx status.
        let envelope: ApiResponse<T> = resp.json().await?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope<T>(envelope: ApiResponse<T>) -> Result<T, TelegramError> {
    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { ok: true, .. } => Err(TelegramError::Protocol("missing result".to_string())),
        ApiResponse {
            description,
            error_code,
            ..
        } => Err(TelegramError::Api {
            code: error_code.unwrap_or_default(),
            description: description.unwrap_or_else(|| "unknown error".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_urls_keep_base_path() {
        let client = BotClient::new("https://api.telegram.org", "123:abc").unwrap();
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn custom_api_base_with_path() {
        let client = BotClient::new("http://localhost:8081/tg/", "t").unwrap();
        assert_eq!(client.method_url("getMe"), "http://localhost:8081/tg/bott/getMe");
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            BotClient::new("not a url", "t"),
            Err(TelegramError::UrlParse(_))
        ));
    }

    #[tokio::test]
    async fn transport_errors_do_not_expose_the_token() {
        let client = BotClient::new("http://127.0.0.1:1", "123:SECRETTOKEN").unwrap();
        let err = client.get_me().await.unwrap_err();
        assert!(matches!(err, TelegramError::Http(_)));
        let rendered = format!("{err} {err:?}");
        assert!(!rendered.contains("SECRETTOKEN"), "token leaked: {rendered}");
    }

    #[test]
    fn envelope_errors_surface_description() {
        let env: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#,
        )
        .unwrap();
        match unwrap_envelope(env) {
            Err(TelegramError::Api { code, description }) => {
                assert_eq!(code, 400);
                assert!(description.contains("chat not found"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let env: ApiResponse<bool> = serde_json::from_str(r#"{"ok": true, "result": true}"#).unwrap();
        assert!(unwrap_envelope(env).unwrap());
    }
}
