//! Task repository.

use chrono::{Datelike, NaiveDate, Utc};
use prhub_common::error::HubResult;
use prhub_common::models::{
    Task, TaskFilter, TaskPriority, TaskStage, TaskStatus, TaskType, UpdateTaskRequest,
    format_task_number,
};
use prhub_common::ids::generate_id;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub template_id: Option<Uuid>,
}

async fn next_task_number(conn: &mut PgConnection) -> Result<String, sqlx::Error> {
    let (seq,): (i64,) = sqlx::query_as("SELECT nextval('task_number_seq')")
        .fetch_one(&mut *conn)
        .await?;
    Ok(format_task_number(Utc::now().year(), seq))
}

/// Create a task and its initial stages (in the given order) atomically.
pub async fn create_task(
    pool: &PgPool,
    new: &NewTask<'_>,
    stage_names: &[String],
) -> HubResult<(Task, Vec<TaskStage>)> {
    let mut tx = pool.begin().await?;

    let task_number = next_task_number(&mut tx).await?;
    let task = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (id, task_number, title, description, task_type, status, priority,
                           due_date, created_by, template_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(new.id)
    .bind(&task_number)
    .bind(new.title)
    .bind(new.description)
    .bind(new.task_type)
    .bind(new.status)
    .bind(new.priority)
    .bind(new.due_date)
    .bind(new.created_by)
    .bind(new.template_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut stages = Vec::with_capacity(stage_names.len());
    for (order, name) in stage_names.iter().enumerate() {
        let stage = sqlx::query_as::<_, TaskStage>(
            r#"
            INSERT INTO task_stages (id, task_id, name, stage_order, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING *
            "#,
        )
        .bind(generate_id())
        .bind(task.id)
        .bind(name.trim())
        .bind(order as i32)
        .fetch_one(&mut *tx)
        .await?;
        stages.push(stage);
    }

    tx.commit().await?;
    Ok((task, stages))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List tasks, newest first. `assignee_id` matches active (non-cancelled)
/// assignments.
pub async fn list_tasks(
    pool: &PgPool,
    filter: &TaskFilter,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Task>, i64), sqlx::Error> {
    const WHERE: &str = r#"
        WHERE ($1::text IS NULL OR t.status = $1)
          AND ($2::text IS NULL OR t.task_type = $2)
          AND ($3::text IS NULL OR t.priority = $3)
          AND ($4::uuid IS NULL OR EXISTS (
                SELECT 1 FROM task_assignments a
                WHERE a.task_id = t.id AND a.user_id = $4 AND a.status <> 'cancelled'))
    "#;

    let tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT t.* FROM tasks t {WHERE} ORDER BY t.created_at DESC, t.id OFFSET $5 LIMIT $6"
    ))
    .bind(filter.status)
    .bind(filter.task_type)
    .bind(filter.priority)
    .bind(filter.assignee_id)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM tasks t {WHERE}"))
        .bind(filter.status)
        .bind(filter.task_type)
        .bind(filter.priority)
        .bind(filter.assignee_id)
        .fetch_one(pool)
        .await?;

    Ok((tasks, total.0))
}

pub async fn update_task(
    pool: &PgPool,
    id: Uuid,
    req: &UpdateTaskRequest,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            task_type = COALESCE($4, task_type),
            priority = COALESCE($5, priority),
            due_date = COALESCE($6, due_date),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.title.as_deref().map(str::trim))
    .bind(req.description.as_deref())
    .bind(req.task_type)
    .bind(req.priority)
    .bind(req.due_date)
    .fetch_optional(pool)
    .await
}

/// Compare-and-set the status. Returns `None` when the task is gone or its
/// status is no longer `from`. Entering `completed` stamps `completed_at`.
pub async fn set_status(
    pool: &PgPool,
    id: Uuid,
    from: TaskStatus,
    to: TaskStatus,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks SET
            status = $3,
            completed_at = CASE WHEN $3 = 'completed' THEN NOW() ELSE completed_at END,
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .fetch_optional(pool)
    .await
}

pub async fn delete_task(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{assignments, fixtures};
    use prhub_common::models::AssignmentRole;

    #[sqlx::test(migrations = "./migrations")]
    async fn total_counts_the_filtered_set_not_the_page(pool: PgPool) {
        for i in 0..5 {
            fixtures::task(&pool, &format!("Post {i}"), TaskType::Smm, TaskStatus::Open, &[]).await;
        }
        for i in 0..3 {
            let title = format!("Poster {i}");
            fixtures::task(&pool, &title, TaskType::Design, TaskStatus::Open, &[]).await;
        }
        fixtures::task(&pool, "Old post", TaskType::Smm, TaskStatus::Completed, &[]).await;

        let smm_open = TaskFilter {
            status: Some(TaskStatus::Open),
            task_type: Some(TaskType::Smm),
            ..Default::default()
        };
        let (page, total) = list_tasks(&pool, &smm_open, 0, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (last, total) = list_tasks(&pool, &smm_open, 4, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(last.len(), 1);
        assert!(!page.iter().any(|t| t.id == last[0].id));

        let (_, all) = list_tasks(&pool, &TaskFilter::default(), 0, 1).await.unwrap();
        assert_eq!(all, 9);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn assignee_filter_ignores_cancelled_assignments(pool: PgPool) {
        let user = fixtures::volunteer(&pool, "ivan").await;
        let (mine, _) = fixtures::task(&pool, "Reel", TaskType::Smm, TaskStatus::Open, &[]).await;
        let (dropped, _) = fixtures::task(&pool, "Cut", TaskType::Smm, TaskStatus::Open, &[]).await;
        fixtures::task(&pool, "Other", TaskType::Smm, TaskStatus::Open, &[]).await;

        for task in [&mine, &dropped] {
            assignments::assign(&pool, generate_id(), task.id, user.id, AssignmentRole::Executor)
                .await
                .unwrap();
        }
        assignments::set_status(
            &pool,
            dropped.id,
            user.id,
            prhub_common::models::AssignmentStatus::Assigned,
            prhub_common::models::AssignmentStatus::Cancelled,
        )
        .await
        .unwrap()
        .unwrap();

        let filter = TaskFilter {
            assignee_id: Some(user.id),
            ..Default::default()
        };
        let (tasks, total) = list_tasks(&pool, &filter, 0, 20).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(tasks[0].id, mine.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn stages_keep_their_order(pool: PgPool) {
        let pipeline = ["Brief", " Draft ", "Print"];
        let (task, stages) =
            fixtures::task(&pool, "Poster", TaskType::Design, TaskStatus::Draft, &pipeline).await;
        assert!(task.task_number.starts_with("PR-"), "{}", task.task_number);
        let names: Vec<_> = stages.iter().map(|s| (s.stage_order, s.name.as_str())).collect();
        assert_eq!(names, [(0, "Brief"), (1, "Draft"), (2, "Print")]);
    }
}
