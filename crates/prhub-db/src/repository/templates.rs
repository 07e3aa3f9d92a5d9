//! Task template repository.

use prhub_common::error::HubResult;
use prhub_common::models::{TaskPriority, TaskTemplate, TaskType, UpdateTemplateRequest};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::conflict;

#[derive(Debug, Clone)]
pub struct NewTemplate<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub stages: &'a [String],
    pub default_duration_days: i32,
    pub created_by: Uuid,
}

pub async fn create_template(pool: &PgPool, new: &NewTemplate<'_>) -> HubResult<TaskTemplate> {
    sqlx::query_as::<_, TaskTemplate>(
        r#"
        INSERT INTO task_templates (id, name, description, task_type, priority, stages,
                                    default_duration_days, is_active, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(new.id)
    .bind(new.name)
    .bind(new.description)
    .bind(new.task_type)
    .bind(new.priority)
    .bind(Json(new.stages))
    .bind(new.default_duration_days)
    .bind(new.created_by)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict(e, "Template name"))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<TaskTemplate>, sqlx::Error> {
    sqlx::query_as::<_, TaskTemplate>("SELECT * FROM task_templates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Templates by name. Inactive ones are hidden unless requested.
pub async fn list_templates(
    pool: &PgPool,
    include_inactive: bool,
    offset: i64,
    limit: i64,
) -> Result<(Vec<TaskTemplate>, i64), sqlx::Error> {
    let items = sqlx::query_as::<_, TaskTemplate>(
        "SELECT * FROM task_templates WHERE ($1 OR is_active) ORDER BY name OFFSET $2 LIMIT $3",
    )
    .bind(include_inactive)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_templates WHERE ($1 OR is_active)")
        .bind(include_inactive)
        .fetch_one(pool)
        .await?;

    Ok((items, total.0))
}

pub async fn update_template(
    pool: &PgPool,
    id: Uuid,
    req: &UpdateTemplateRequest,
) -> HubResult<Option<TaskTemplate>> {
    sqlx::query_as::<_, TaskTemplate>(
        r#"
        UPDATE task_templates SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            task_type = COALESCE($4, task_type),
            priority = COALESCE($5, priority),
            stages = COALESCE($6, stages),
            default_duration_days = COALESCE($7, default_duration_days),
            is_active = COALESCE($8, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.description.as_deref())
    .bind(req.task_type)
    .bind(req.priority)
    .bind(req.stages.as_ref().map(Json))
    .bind(req.default_duration_days)
    .bind(req.is_active)
    .fetch_optional(pool)
    .await
    .map_err(|e| conflict(e, "Template name"))
}

pub async fn delete_template(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM task_templates WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
