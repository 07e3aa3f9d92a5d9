//! Notification fan-out: store in-app notifications and mirror them to the
//! member's Telegram chat.
//!
//! Everything here runs after the primary change has been committed, on a
//! spawned task. Failures are logged and never reach the caller.

use prhub_common::models::NewNotification;
use prhub_common::ids;
use prhub_db::repository::{notifications, users};
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;

/// Store and push one notification in the background.
pub fn spawn(state: &Arc<AppState>, notification: NewNotification) {
    let state = state.clone();
    tokio::spawn(async move {
        deliver(&state, &notification).await;
    });
}

/// Store and push the same notification to several members, skipping `except`.
pub fn spawn_many(
    state: &Arc<AppState>,
    recipients: Vec<Uuid>,
    except: Option<Uuid>,
    build: impl Fn(Uuid) -> NewNotification + Send + 'static,
) {
    let state = state.clone();
    tokio::spawn(async move {
        for user_id in recipients.into_iter().filter(|id| Some(*id) != except) {
            deliver(&state, &build(user_id)).await;
        }
    });
}

/// Post a message to the department chat, when one is configured.
pub fn spawn_department_post(state: &Arc<AppState>, text: String) {
    let Some(chat_id) = prhub_common::config::get().telegram.department_chat_id else {
        return;
    };
    let Some(bot) = state.telegram.clone() else {
        return;
    };
    tokio::spawn(async move {
        if let Err(e) = bot.send_message(chat_id, &text, None).await {
            tracing::warn!(chat_id, "Department chat post failed: {e}");
        }
    });
}

async fn deliver(state: &AppState, notification: &NewNotification) {
    let id = ids::generate_id();
    if let Err(e) = notifications::create_notification(&state.db.pg, id, notification).await {
        tracing::warn!(user_id = %notification.user_id, "Failed to store notification: {e}");
    }

    let Some(bot) = &state.telegram else {
        return;
    };

    let chat_id = match users::find_by_id(&state.db.pg, notification.user_id).await {
        Ok(Some(user)) if !user.is_deleted() => user.telegram_id,
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(user_id = %notification.user_id, "Recipient lookup failed: {e}");
            None
        }
    };

    if let Some(chat_id) = chat_id {
        if let Err(e) = bot.send_message(chat_id, &notification.as_text(), None).await {
            tracing::warn!(user_id = %notification.user_id, "Telegram push failed: {e}");
        }
    }
}
