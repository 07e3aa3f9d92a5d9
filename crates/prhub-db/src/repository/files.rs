//! File upload repository.

use prhub_common::error::HubResult;
use prhub_common::models::{
    FileFilter, FileUpload, ModerationEntry, ModerationItemType, StorageFolder, UploadStatus,
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::moderation;

#[derive(Debug, Clone)]
pub struct NewFileUpload<'a> {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub task_id: Option<Uuid>,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub size: i64,
    pub storage_key: &'a str,
    pub title: Option<&'a str>,
    pub publish_to_gallery: bool,
    pub sha256: &'a str,
}

/// Record a freshly stored upload (temp folder, pending).
pub async fn create_upload(
    executor: impl PgExecutor<'_>,
    new: &NewFileUpload<'_>,
) -> Result<FileUpload, sqlx::Error> {
    sqlx::query_as::<_, FileUpload>(
        r#"
        INSERT INTO file_uploads (id, uploader_id, task_id, filename, content_type, size, storage_key,
                                  folder, status, title, publish_to_gallery, sha256, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'temp', 'pending', $8, $9, $10, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(new.id)
    .bind(new.uploader_id)
    .bind(new.task_id)
    .bind(new.filename)
    .bind(new.content_type)
    .bind(new.size)
    .bind(new.storage_key)
    .bind(new.title)
    .bind(new.publish_to_gallery)
    .bind(new.sha256)
    .fetch_one(executor)
    .await
}

/// Record an upload and queue it for moderation in one transaction.
pub async fn create_with_moderation(
    pool: &PgPool,
    new: &NewFileUpload<'_>,
    moderation_id: Uuid,
) -> HubResult<(FileUpload, ModerationEntry)> {
    let mut tx = pool.begin().await?;

    let file = create_upload(&mut *tx, new).await?;
    let payload = serde_json::json!({
        "filename": file.filename,
        "content_type": file.content_type,
        "size": file.size,
        "title": file.title,
        "task_id": file.task_id,
        "publish_to_gallery": file.publish_to_gallery,
    });
    let entry = moderation::create_entry(
        &mut *tx,
        moderation_id,
        ModerationItemType::FileUpload,
        file.id,
        file.uploader_id,
        payload,
    )
    .await?;

    tx.commit().await?;
    Ok((file, entry))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<FileUpload>, sqlx::Error> {
    sqlx::query_as::<_, FileUpload>("SELECT * FROM file_uploads WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List uploads, newest first. `uploader_id` restricts to one member's files.
pub async fn list_uploads(
    pool: &PgPool,
    filter: &FileFilter,
    uploader_id: Option<Uuid>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<FileUpload>, i64), sqlx::Error> {
    const WHERE: &str = r#"
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::uuid IS NULL OR task_id = $2)
          AND ($3::uuid IS NULL OR uploader_id = $3)
    "#;

    let items = sqlx::query_as::<_, FileUpload>(&format!(
        "SELECT * FROM file_uploads {WHERE} ORDER BY created_at DESC, id OFFSET $4 LIMIT $5"
    ))
    .bind(filter.status)
    .bind(filter.task_id)
    .bind(uploader_id)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM file_uploads {WHERE}"))
        .bind(filter.status)
        .bind(filter.task_id)
        .bind(uploader_id)
        .fetch_one(pool)
        .await?;

    Ok((items, total.0))
}

/// Apply a moderation outcome to a pending upload.
pub async fn set_moderated(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    status: UploadStatus,
    folder: StorageFolder,
    storage_key: Option<&str>,
) -> Result<Option<FileUpload>, sqlx::Error> {
    sqlx::query_as::<_, FileUpload>(
        r#"
        UPDATE file_uploads SET
            status = $2,
            folder = $3,
            storage_key = COALESCE($4, storage_key),
            updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(folder)
    .bind(storage_key)
    .fetch_optional(executor)
    .await
}

pub async fn delete_upload(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM file_uploads WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
