//! Equipment inventory repository.

use chrono::NaiveDate;
use prhub_common::models::{
    EquipmentCategory, Equipment, EquipmentFilter, UpdateEquipmentRequest,
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

pub async fn create_equipment(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    category: EquipmentCategory,
    quantity: i32,
    description: Option<&str>,
) -> Result<Equipment, sqlx::Error> {
    sqlx::query_as::<_, Equipment>(
        r#"
        INSERT INTO equipment (id, name, category, quantity, description, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 'available', NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(category)
    .bind(quantity)
    .bind(description)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Equipment>, sqlx::Error> {
    sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_equipment(
    pool: &PgPool,
    filter: &EquipmentFilter,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Equipment>, i64), sqlx::Error> {
    const WHERE: &str = r#"
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::text IS NULL OR status = $2)
    "#;

    let items = sqlx::query_as::<_, Equipment>(&format!(
        "SELECT * FROM equipment {WHERE} ORDER BY name, id OFFSET $3 LIMIT $4"
    ))
    .bind(filter.category)
    .bind(filter.status)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM equipment {WHERE}"))
        .bind(filter.category)
        .bind(filter.status)
        .fetch_one(pool)
        .await?;

    Ok((items, total.0))
}

pub async fn update_equipment(
    pool: &PgPool,
    id: Uuid,
    req: &UpdateEquipmentRequest,
) -> Result<Option<Equipment>, sqlx::Error> {
    sqlx::query_as::<_, Equipment>(
        r#"
        UPDATE equipment SET
            name = COALESCE($2, name),
            category = COALESCE($3, category),
            quantity = COALESCE($4, quantity),
            description = COALESCE($5, description),
            status = COALESCE($6, status),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.category)
    .bind(req.quantity)
    .bind(req.description.as_deref())
    .bind(req.status)
    .fetch_optional(pool)
    .await
}

pub async fn delete_equipment(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Units held by approved or issued bookings overlapping `[start, end]`.
pub async fn booked_quantity(
    executor: impl PgExecutor<'_>,
    equipment_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<i64, sqlx::Error> {
    let (booked,): (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM equipment_requests
        WHERE equipment_id = $1
          AND status IN ('approved', 'active')
          AND start_date <= $3 AND $2 <= end_date
        "#,
    )
    .bind(equipment_id)
    .bind(start)
    .bind(end)
    .fetch_one(executor)
    .await?;
    Ok(booked)
}
