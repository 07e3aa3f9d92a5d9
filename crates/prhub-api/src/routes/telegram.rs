//! Telegram bot webhook.
//!
//! Telegram retries any update that does not get a 2xx, so once the secret
//! header checks out every update is acknowledged, even ones we ignore or
//! fail to handle.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use prhub_common::{
    config,
    error::{HubError, HubResult},
    models::User,
};
use prhub_db::repository::{telegram, users};
use prhub_telegram::{Command, parse_command, types::Update};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::AppState;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

const HELP_TEXT: &str = "PR Hub bot\n\n\
/me - your role, points and level\n\
/help - this message\n\n\
Scan the QR code on the PR Hub login page to sign in.";

const NOT_REGISTERED: &str =
    "This Telegram account is not registered yet. Sign up on the PR Hub website first.";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/telegram/webhook", post(webhook))
}

/// POST /api/v1/telegram/webhook
async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> HubResult<Json<Value>> {
    let expected = &config::get().telegram.webhook_secret;
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if expected.is_empty() || provided != Some(expected.as_str()) {
        return Err(HubError::Unauthorized);
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!("Unreadable Telegram update: {e}");
            return Ok(Json(json!({ "ok": true })));
        }
    };

    if let Err(e) = handle_update(&state, update).await {
        tracing::warn!("Telegram update failed: {e}");
    }
    Ok(Json(json!({ "ok": true })))
}

async fn handle_update(state: &AppState, update: Update) -> HubResult<()> {
    let Some(message) = update.message else {
        return Ok(());
    };
    let (Some(text), Some(from)) = (message.text.as_deref(), message.from.as_ref()) else {
        return Ok(());
    };
    // Commands are only answered in private chats with the bot.
    if !message.chat.is_private() {
        return Ok(());
    }
    let bot_username = &config::get().telegram.bot_username;
    let Some(command) = parse_command(text, Some(bot_username)) else {
        return Ok(());
    };
    let Some(bot) = &state.telegram else {
        return Ok(());
    };

    tracing::debug!(update_id = update.update_id, telegram_id = from.id, ?command, "Bot command");
    let member = users::find_by_telegram_id(&state.db.pg, from.id).await?;

    let reply = if let Some(token) = command.qr_token() {
        confirm_qr(state, member.as_ref(), token).await?
    } else {
        match &command {
            Command::Me => match member.as_ref().filter(|u| !u.is_deleted()) {
                Some(user) => profile_text(user),
                None => NOT_REGISTERED.to_string(),
            },
            Command::Start(_) | Command::Help | Command::Unknown(_) => HELP_TEXT.to_string(),
        }
    };

    bot.send_message(message.chat.id, &reply, message.message_thread_id)
        .await
        .map_err(|e| HubError::External {
            service: "telegram".into(),
            message: e.to_string(),
        })?;
    Ok(())
}

/// Bind a pending QR login session to the member who scanned it.
async fn confirm_qr(state: &AppState, member: Option<&User>, token: &str) -> HubResult<String> {
    let Some(user) = member.filter(|u| !u.is_deleted()) else {
        return Ok(NOT_REGISTERED.to_string());
    };
    if !user.can_authenticate() {
        return Ok("Your registration has not been approved yet.".to_string());
    }

    match telegram::confirm_qr_session(&state.db.pg, token, user.id).await? {
        Some(_) => {
            tracing::info!(user_id = %user.id, "QR login confirmed");
            Ok("Login confirmed. You can return to your browser.".to_string())
        }
        None => Ok("This QR code has expired. Refresh the login page and try again.".to_string()),
    }
}

fn profile_text(user: &User) -> String {
    format!(
        "{}\nRole: {}\nPoints: {}\nLevel: {}",
        user.full_name, user.role, user.points, user.level
    )
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use super::SECRET_HEADER;
    use crate::test_support;

    const PLAIN_TEXT_UPDATE: &str = r#"{
        "update_id": 1,
        "message": {
            "message_id": 5,
            "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
            "chat": { "id": 42, "type": "private" },
            "text": "hello"
        }
    }"#;

    fn webhook(secret: Option<&str>, body: &'static str) -> Request<Body> {
        let mut req = Request::post("/api/v1/telegram/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            req = req.header(SECRET_HEADER, secret);
        }
        req.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let response = test_support::app()
            .oneshot(webhook(Some("nope"), PLAIN_TEXT_UPDATE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = test_support::app()
            .oneshot(webhook(None, PLAIN_TEXT_UPDATE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ignored_updates_are_acknowledged() {
        for body in [PLAIN_TEXT_UPDATE, "not json", r#"{"update_id": 2}"#] {
            let response = test_support::app()
                .oneshot(webhook(Some(test_support::WEBHOOK_SECRET), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["ok"], true);
        }
    }
}
