//! Notification repository.

use prhub_common::models::{NewNotification, Notification};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

pub async fn create_notification(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    new: &NewNotification,
) -> Result<Notification, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (id, user_id, kind, title, message, payload, is_read, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(new.user_id)
    .bind(new.kind)
    .bind(&new.title)
    .bind(&new.message)
    .bind(&new.payload)
    .fetch_one(executor)
    .await
}

/// A user's notifications, newest first.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    unread_only: bool,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Notification>, i64), sqlx::Error> {
    let items = sqlx::query_as::<_, Notification>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
        ORDER BY created_at DESC, id DESC
        OFFSET $3 LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read)",
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_one(pool)
    .await?;

    Ok((items, total.0))
}

pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Mark one notification read. `None` when it does not belong to the user.
pub async fn mark_read(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        r#"
        UPDATE notifications SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE, read_at = NOW() WHERE user_id = $1 AND NOT is_read",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_notification(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
