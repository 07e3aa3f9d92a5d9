//! Telegram-linked records: task chat topics and QR login sessions.

use chrono::{DateTime, Utc};
use prhub_common::error::HubResult;
use prhub_common::models::{QrSession, TelegramChat};
use sqlx::PgPool;
use uuid::Uuid;

use super::conflict;

pub async fn create_chat(
    pool: &PgPool,
    id: Uuid,
    chat_id: i64,
    message_thread_id: Option<i64>,
    task_id: Uuid,
    title: &str,
) -> HubResult<TelegramChat> {
    sqlx::query_as::<_, TelegramChat>(
        r#"
        INSERT INTO telegram_chats (id, chat_id, message_thread_id, task_id, title, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(chat_id)
    .bind(message_thread_id)
    .bind(task_id)
    .bind(title)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict(e, "Task chat"))
}

pub async fn find_chat_for_task(pool: &PgPool, task_id: Uuid) -> Result<Option<TelegramChat>, sqlx::Error> {
    sqlx::query_as::<_, TelegramChat>("SELECT * FROM telegram_chats WHERE task_id = $1")
        .bind(task_id)
        .fetch_optional(pool)
        .await
}

pub async fn create_qr_session(
    pool: &PgPool,
    id: Uuid,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<QrSession, sqlx::Error> {
    sqlx::query_as::<_, QrSession>(
        r#"
        INSERT INTO qr_sessions (id, session_token, status, expires_at, created_at)
        VALUES ($1, $2, 'pending', $3, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(token)
    .bind(expires_at)
    .fetch_one(pool)
    .await
}

pub async fn find_qr_session(pool: &PgPool, token: &str) -> Result<Option<QrSession>, sqlx::Error> {
    sqlx::query_as::<_, QrSession>("SELECT * FROM qr_sessions WHERE session_token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await
}

/// Bind a pending, unexpired session to the user who scanned it.
pub async fn confirm_qr_session(
    pool: &PgPool,
    token: &str,
    user_id: Uuid,
) -> Result<Option<QrSession>, sqlx::Error> {
    sqlx::query_as::<_, QrSession>(
        r#"
        UPDATE qr_sessions SET status = 'confirmed', user_id = $2, confirmed_at = NOW()
        WHERE session_token = $1 AND status = 'pending' AND expires_at > NOW()
        RETURNING *
        "#,
    )
    .bind(token)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Retire a session. Returns the row as it was before, if it was still
/// pending or confirmed; a confirmed session can be redeemed only once.
pub async fn expire_qr_session(pool: &PgPool, token: &str) -> Result<Option<QrSession>, sqlx::Error> {
    sqlx::query_as::<_, QrSession>(
        r#"
        UPDATE qr_sessions s SET status = 'expired'
        FROM qr_sessions old
        WHERE s.session_token = $1 AND old.id = s.id AND s.status <> 'expired'
        RETURNING old.*
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use chrono::Duration;
    use prhub_common::ids::generate_id;
    use prhub_common::models::QrSessionStatus;

    #[sqlx::test(migrations = "./migrations")]
    async fn session_confirms_once_and_redeems_once(pool: PgPool) {
        let user = fixtures::volunteer(&pool, "scanner").await;
        let other = fixtures::volunteer(&pool, "latecomer").await;
        create_qr_session(&pool, generate_id(), "tok-live", Utc::now() + Duration::minutes(5))
            .await
            .unwrap();

        let confirmed = confirm_qr_session(&pool, "tok-live", user.id).await.unwrap().unwrap();
        assert_eq!(confirmed.status, QrSessionStatus::Confirmed);
        assert_eq!(confirmed.user_id, Some(user.id));

        assert!(confirm_qr_session(&pool, "tok-live", other.id).await.unwrap().is_none());
        let stored = find_qr_session(&pool, "tok-live").await.unwrap().unwrap();
        assert_eq!(stored.user_id, Some(user.id));

        let redeemed = expire_qr_session(&pool, "tok-live").await.unwrap().unwrap();
        assert_eq!(redeemed.status, QrSessionStatus::Confirmed);
        assert_eq!(redeemed.user_id, Some(user.id));
        assert!(expire_qr_session(&pool, "tok-live").await.unwrap().is_none());
        assert_eq!(
            find_qr_session(&pool, "tok-live").await.unwrap().unwrap().status,
            QrSessionStatus::Expired
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn expired_session_cannot_be_confirmed(pool: PgPool) {
        let user = fixtures::volunteer(&pool, "slow").await;
        create_qr_session(&pool, generate_id(), "tok-old", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        assert!(confirm_qr_session(&pool, "tok-old", user.id).await.unwrap().is_none());
        let stored = find_qr_session(&pool, "tok-old").await.unwrap().unwrap();
        assert_eq!(stored.status, QrSessionStatus::Pending);
        assert_eq!(stored.user_id, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn one_topic_per_task(pool: PgPool) {
        let (task, _) = fixtures::task(
            &pool,
            "Launch",
            prhub_common::models::TaskType::Channel,
            prhub_common::models::TaskStatus::Open,
            &[],
        )
        .await;
        create_chat(&pool, generate_id(), -100, Some(7), task.id, "PR-1 Launch").await.unwrap();

        let err = create_chat(&pool, generate_id(), -100, Some(8), task.id, "dup").await.unwrap_err();
        assert!(matches!(err, prhub_common::error::HubError::AlreadyExists { .. }));
        let chat = find_chat_for_task(&pool, task.id).await.unwrap().unwrap();
        assert_eq!(chat.message_thread_id, Some(7));
    }
}
