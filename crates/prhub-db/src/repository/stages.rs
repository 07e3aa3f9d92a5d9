//! Task stage repository.

use chrono::NaiveDate;
use prhub_common::error::HubResult;
use prhub_common::models::{StageStatus, TaskStage};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::conflict;

/// Stages of a task in pipeline order.
pub async fn list_for_task(
    executor: impl PgExecutor<'_>,
    task_id: Uuid,
) -> Result<Vec<TaskStage>, sqlx::Error> {
    sqlx::query_as::<_, TaskStage>(
        "SELECT * FROM task_stages WHERE task_id = $1 ORDER BY stage_order ASC",
    )
    .bind(task_id)
    .fetch_all(executor)
    .await
}

/// Append a stage after the current last one. Two appends racing for the
/// same position leave one of them with `AlreadyExists`.
pub async fn append_stage(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    task_id: Uuid,
    name: &str,
    due_date: Option<NaiveDate>,
) -> HubResult<TaskStage> {
    sqlx::query_as::<_, TaskStage>(
        r#"
        INSERT INTO task_stages (id, task_id, name, stage_order, due_date, created_at)
        SELECT $1, $2, $3, COALESCE(MAX(stage_order) + 1, 0), $4, NOW()
        FROM task_stages WHERE task_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(task_id)
    .bind(name)
    .bind(due_date)
    .fetch_one(executor)
    .await
    .map_err(|e| conflict(e, "Stage at this position"))
}

pub async fn find_stage(
    pool: &PgPool,
    task_id: Uuid,
    stage_id: Uuid,
) -> Result<Option<TaskStage>, sqlx::Error> {
    sqlx::query_as::<_, TaskStage>("SELECT * FROM task_stages WHERE id = $1 AND task_id = $2")
        .bind(stage_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await
}

/// Update a stage whose status is still `expected`. Returns `None` when
/// another writer moved it first. Completing it stamps `completed_at`.
pub async fn update_stage(
    pool: &PgPool,
    stage_id: Uuid,
    expected: StageStatus,
    name: Option<&str>,
    status: Option<StageStatus>,
    due_date: Option<NaiveDate>,
) -> Result<Option<TaskStage>, sqlx::Error> {
    sqlx::query_as::<_, TaskStage>(
        r#"
        UPDATE task_stages SET
            name = COALESCE($2, name),
            status = COALESCE($3, status),
            completed_at = CASE WHEN $3 = 'completed' THEN NOW() ELSE completed_at END,
            due_date = COALESCE($4, due_date)
        WHERE id = $1 AND status = $5
        RETURNING *
        "#,
    )
    .bind(stage_id)
    .bind(name)
    .bind(status)
    .bind(due_date)
    .bind(expected)
    .fetch_optional(pool)
    .await
}

pub async fn delete_stage(pool: &PgPool, task_id: Uuid, stage_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM task_stages WHERE id = $1 AND task_id = $2")
        .bind(stage_id)
        .bind(task_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use prhub_common::error::HubError;
    use prhub_common::ids::generate_id;
    use prhub_common::models::{TaskStatus, TaskType};
    use std::time::Duration;

    async fn move_stage(
        pool: &PgPool,
        id: Uuid,
        from: StageStatus,
        to: StageStatus,
    ) -> Option<TaskStage> {
        update_stage(pool, id, from, None, Some(to), None).await.unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn stale_update_does_not_apply(pool: PgPool) {
        let (_, stages) =
            fixtures::task(&pool, "Poster", TaskType::Design, TaskStatus::Open, &["Sketch"]).await;
        let id = stages[0].id;

        let started = move_stage(&pool, id, StageStatus::Pending, StageStatus::InProgress).await;
        assert_eq!(started.unwrap().status, StageStatus::InProgress);

        // A second writer that read the stage while it was still pending.
        let stale = move_stage(&pool, id, StageStatus::Pending, StageStatus::Skipped).await;
        assert!(stale.is_none());

        let done = move_stage(&pool, id, StageStatus::InProgress, StageStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, StageStatus::Completed);
        assert!(done.completed_at.is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn appends_go_to_the_end(pool: PgPool) {
        let pipeline = ["Script", "Shoot"];
        let (task, _) = fixtures::task(&pool, "Ad", TaskType::Smm, TaskStatus::Open, &pipeline).await;
        let stage = append_stage(&pool, generate_id(), task.id, "Edit", None).await.unwrap();
        assert_eq!(stage.stage_order, 2);

        let (empty, _) = fixtures::task(&pool, "Blank", TaskType::Smm, TaskStatus::Open, &[]).await;
        let first = append_stage(&pool, generate_id(), empty.id, "Only", None).await.unwrap();
        assert_eq!(first.stage_order, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn racing_append_is_a_conflict(pool: PgPool) {
        let (task, _) =
            fixtures::task(&pool, "Reel", TaskType::Smm, TaskStatus::Open, &["Script"]).await;

        let mut tx = pool.begin().await.unwrap();
        let winner = append_stage(&mut *tx, generate_id(), task.id, "Shoot", None).await.unwrap();
        assert_eq!(winner.stage_order, 1);

        // The second insert computes the same position and waits on the
        // unique index until the first transaction commits.
        let (loser, committed) = tokio::join!(
            append_stage(&pool, generate_id(), task.id, "Edit", None),
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                tx.commit().await
            }
        );
        committed.unwrap();

        let err = loser.unwrap_err();
        assert!(matches!(err, HubError::AlreadyExists { .. }), "{err:?}");
        let names: Vec<_> = list_for_task(&pool, task.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["Script", "Shoot"]);
    }
}
