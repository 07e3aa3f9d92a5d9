//! Moderation queue repository.
//!
//! Decisions that touch the moderated item (user or upload) run in the same
//! transaction as the queue update.

use prhub_common::error::{HubError, HubResult};
use prhub_common::models::{
    FileUpload, GalleryItem, ModerationEntry, ModerationFilter, ModerationItemType,
    ModerationStatus, RegistrationStatus, StorageFolder, UploadStatus, User,
};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::conflict;
use super::gallery::NewGalleryItem;

/// Queue an item. A second pending entry for the same item is a conflict.
pub async fn create_entry(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    item_type: ModerationItemType,
    item_id: Uuid,
    submitted_by: Uuid,
    payload: serde_json::Value,
) -> HubResult<ModerationEntry> {
    sqlx::query_as::<_, ModerationEntry>(
        r#"
        INSERT INTO moderation_queue (id, item_type, item_id, submitted_by, payload, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(item_type)
    .bind(item_id)
    .bind(submitted_by)
    .bind(payload)
    .fetch_one(executor)
    .await
    .map_err(|e| conflict(e, "Pending moderation entry"))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ModerationEntry>, sqlx::Error> {
    sqlx::query_as::<_, ModerationEntry>("SELECT * FROM moderation_queue WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Oldest first, so moderators work the queue in submission order.
pub async fn list_entries(
    pool: &PgPool,
    filter: &ModerationFilter,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ModerationEntry>, i64), sqlx::Error> {
    const WHERE: &str = r#"
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR item_type = $2)
    "#;

    let items = sqlx::query_as::<_, ModerationEntry>(&format!(
        "SELECT * FROM moderation_queue {WHERE} ORDER BY created_at ASC, id OFFSET $3 LIMIT $4"
    ))
    .bind(filter.status)
    .bind(filter.item_type)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM moderation_queue {WHERE}"))
        .bind(filter.status)
        .bind(filter.item_type)
        .fetch_one(pool)
        .await?;

    Ok((items, total.0))
}

/// Lock a pending entry and record the decision.
async fn decide(
    conn: &mut PgConnection,
    id: Uuid,
    decision: ModerationStatus,
    reviewer_id: Uuid,
    comment: Option<&str>,
) -> HubResult<ModerationEntry> {
    let entry = sqlx::query_as::<_, ModerationEntry>(
        "SELECT * FROM moderation_queue WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| HubError::not_found("Moderation entry"))?;

    let status = entry.status.decide(decision)?;

    let updated = sqlx::query_as::<_, ModerationEntry>(
        r#"
        UPDATE moderation_queue SET status = $2, reviewer_id = $3, comment = $4, reviewed_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(reviewer_id)
    .bind(comment)
    .fetch_one(&mut *conn)
    .await?;

    Ok(updated)
}

/// Decide a registration and move the user to the matching status.
pub async fn decide_registration(
    pool: &PgPool,
    id: Uuid,
    decision: ModerationStatus,
    reviewer_id: Uuid,
    comment: Option<&str>,
) -> HubResult<(ModerationEntry, User)> {
    let mut tx = pool.begin().await?;

    let entry = decide(&mut tx, id, decision, reviewer_id, comment).await?;
    if entry.item_type != ModerationItemType::Registration {
        return Err(HubError::validation("Entry is not a registration"));
    }

    let status = match entry.status {
        ModerationStatus::Approved => RegistrationStatus::Approved,
        _ => RegistrationStatus::Rejected,
    };
    let user = super::users::set_registration_status(&mut *tx, entry.item_id, status).await?;

    tx.commit().await?;
    Ok((entry, user))
}

/// Outcome of a file-upload decision.
#[derive(Debug)]
pub struct FileDecision {
    pub entry: ModerationEntry,
    pub file: FileUpload,
    pub gallery_item: Option<GalleryItem>,
}

/// Decide a file upload.
///
/// On approval `permanent_key` is the already-copied object key; the upload
/// row moves to the permanent folder and, when given, a gallery item is
/// created from it.
pub async fn decide_file_upload(
    pool: &PgPool,
    id: Uuid,
    decision: ModerationStatus,
    reviewer_id: Uuid,
    comment: Option<&str>,
    permanent_key: Option<&str>,
    gallery: Option<NewGalleryItem<'_>>,
) -> HubResult<FileDecision> {
    let mut tx = pool.begin().await?;

    let entry = decide(&mut tx, id, decision, reviewer_id, comment).await?;
    if entry.item_type != ModerationItemType::FileUpload {
        return Err(HubError::validation("Entry is not a file upload"));
    }

    let (status, folder) = match (entry.status, permanent_key) {
        (ModerationStatus::Approved, Some(_)) => (UploadStatus::Approved, StorageFolder::Permanent),
        (ModerationStatus::Approved, None) => {
            return Err(HubError::Internal(anyhow::anyhow!(
                "approved upload has no permanent key"
            )));
        }
        _ => (UploadStatus::Rejected, StorageFolder::Temp),
    };

    let file = super::files::set_moderated(&mut *tx, entry.item_id, status, folder, permanent_key)
        .await?
        .ok_or_else(|| HubError::not_found("File"))?;

    let gallery_item = match (status, gallery) {
        (UploadStatus::Approved, Some(item)) => Some(super::gallery::create_item(&mut *tx, &item).await?),
        _ => None,
    };

    tx.commit().await?;
    Ok(FileDecision {
        entry,
        file,
        gallery_item,
    })
}

/// Drop pending entries for an item that no longer exists.
pub async fn delete_pending_for_item(
    pool: &PgPool,
    item_type: ModerationItemType,
    item_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM moderation_queue WHERE item_type = $1 AND item_id = $2 AND status = 'pending'",
    )
    .bind(item_type)
    .bind(item_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
