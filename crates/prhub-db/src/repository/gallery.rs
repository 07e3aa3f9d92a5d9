//! Gallery repository.

use prhub_common::models::{GalleryCategory, GalleryFilter, GalleryItem, UpdateGalleryItemRequest};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewGalleryItem<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub category: GalleryCategory,
    pub file_upload_id: Option<Uuid>,
    pub storage_key: Option<&'a str>,
    pub external_url: Option<&'a str>,
    pub task_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub is_featured: bool,
}

pub async fn create_item(
    executor: impl PgExecutor<'_>,
    new: &NewGalleryItem<'_>,
) -> Result<GalleryItem, sqlx::Error> {
    sqlx::query_as::<_, GalleryItem>(
        r#"
        INSERT INTO gallery_items (id, title, description, category, file_upload_id, storage_key,
                                   external_url, task_id, created_by, is_featured, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(new.id)
    .bind(new.title)
    .bind(new.description)
    .bind(new.category)
    .bind(new.file_upload_id)
    .bind(new.storage_key)
    .bind(new.external_url)
    .bind(new.task_id)
    .bind(new.created_by)
    .bind(new.is_featured)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<GalleryItem>, sqlx::Error> {
    sqlx::query_as::<_, GalleryItem>("SELECT * FROM gallery_items WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Featured items first, then newest.
pub async fn list_items(
    pool: &PgPool,
    filter: &GalleryFilter,
    offset: i64,
    limit: i64,
) -> Result<(Vec<GalleryItem>, i64), sqlx::Error> {
    const WHERE: &str = r#"
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::bool IS NULL OR is_featured = $2)
          AND ($3::uuid IS NULL OR task_id = $3)
    "#;

    let items = sqlx::query_as::<_, GalleryItem>(&format!(
        "SELECT * FROM gallery_items {WHERE} ORDER BY is_featured DESC, created_at DESC, id OFFSET $4 LIMIT $5"
    ))
    .bind(filter.category)
    .bind(filter.featured)
    .bind(filter.task_id)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM gallery_items {WHERE}"))
        .bind(filter.category)
        .bind(filter.featured)
        .bind(filter.task_id)
        .fetch_one(pool)
        .await?;

    Ok((items, total.0))
}

pub async fn update_item(
    pool: &PgPool,
    id: Uuid,
    req: &UpdateGalleryItemRequest,
) -> Result<Option<GalleryItem>, sqlx::Error> {
    sqlx::query_as::<_, GalleryItem>(
        r#"
        UPDATE gallery_items SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            category = COALESCE($4, category),
            is_featured = COALESCE($5, is_featured),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.title.as_deref())
    .bind(req.description.as_deref())
    .bind(req.category)
    .bind(req.is_featured)
    .fetch_optional(pool)
    .await
}

pub async fn delete_item(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM gallery_items WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Whether any gallery item still serves the object at `storage_key`.
pub async fn references_key(pool: &PgPool, storage_key: &str) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM gallery_items WHERE storage_key = $1)")
            .bind(storage_key)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}
