//! Task assignment repository.

use prhub_common::error::{HubError, HubResult};
use prhub_common::models::{AssignmentRole, AssignmentStatus, TaskAssignment, User};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

pub async fn list_for_task(
    executor: impl PgExecutor<'_>,
    task_id: Uuid,
) -> Result<Vec<TaskAssignment>, sqlx::Error> {
    sqlx::query_as::<_, TaskAssignment>(
        "SELECT * FROM task_assignments WHERE task_id = $1 ORDER BY assigned_at ASC",
    )
    .bind(task_id)
    .fetch_all(executor)
    .await
}

pub async fn find(
    pool: &PgPool,
    task_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TaskAssignment>, sqlx::Error> {
    sqlx::query_as::<_, TaskAssignment>(
        "SELECT * FROM task_assignments WHERE task_id = $1 AND user_id = $2",
    )
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Assign a user. A cancelled assignment is revived with a clean slate (no
/// rating, feedback or points); an active one is a conflict.
pub async fn assign(
    pool: &PgPool,
    id: Uuid,
    task_id: Uuid,
    user_id: Uuid,
    role_in_task: AssignmentRole,
) -> HubResult<TaskAssignment> {
    sqlx::query_as::<_, TaskAssignment>(
        r#"
        INSERT INTO task_assignments (id, task_id, user_id, role_in_task, status, assigned_at)
        VALUES ($1, $2, $3, $4, 'assigned', NOW())
        ON CONFLICT (task_id, user_id) DO UPDATE SET
            role_in_task = EXCLUDED.role_in_task,
            status = 'assigned',
            assigned_at = NOW(),
            completed_at = NULL,
            rating = NULL,
            feedback = NULL,
            points_awarded = 0
        WHERE task_assignments.status = 'cancelled'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(task_id)
    .bind(user_id)
    .bind(role_in_task)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| HubError::AlreadyExists {
        resource: "Assignment".to_string(),
    })
}

/// Compare-and-set the assignment status.
pub async fn set_status(
    pool: &PgPool,
    task_id: Uuid,
    user_id: Uuid,
    from: AssignmentStatus,
    to: AssignmentStatus,
) -> Result<Option<TaskAssignment>, sqlx::Error> {
    sqlx::query_as::<_, TaskAssignment>(
        r#"
        UPDATE task_assignments SET
            status = $4,
            completed_at = CASE WHEN $4 = 'completed' THEN NOW() ELSE completed_at END
        WHERE task_id = $1 AND user_id = $2 AND status = $3
        RETURNING *
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_optional(pool)
    .await
}

pub async fn remove(pool: &PgPool, task_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM task_assignments WHERE task_id = $1 AND user_id = $2")
        .bind(task_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Users currently working on a task (for notifications).
pub async fn active_user_ids(pool: &PgPool, task_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT user_id FROM task_assignments WHERE task_id = $1 AND status <> 'cancelled'",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Rate an assignment and award the points to its user in one transaction.
/// An assignment can be rated once.
pub async fn rate(
    pool: &PgPool,
    task_id: Uuid,
    user_id: Uuid,
    rating: i16,
    feedback: Option<&str>,
    points: i32,
) -> HubResult<(TaskAssignment, User)> {
    let mut tx = pool.begin().await?;

    let assignment = sqlx::query_as::<_, TaskAssignment>(
        r#"
        UPDATE task_assignments SET rating = $3, feedback = $4, points_awarded = $5
        WHERE task_id = $1 AND user_id = $2 AND rating IS NULL AND status <> 'cancelled'
        RETURNING *
        "#,
    )
    .bind(task_id)
    .bind(user_id)
    .bind(rating)
    .bind(feedback)
    .bind(points)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| HubError::AlreadyExists {
        resource: "Rating".to_string(),
    })?;

    let user = super::users::apply_progress(&mut tx, user_id, points, None).await?;

    tx.commit().await?;
    Ok((assignment, user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{fixtures, users};
    use prhub_common::ids::generate_id;
    use prhub_common::models::{Role, TaskStatus, TaskType};

    #[sqlx::test(migrations = "./migrations")]
    async fn rating_is_awarded_once_and_recomputes_progress(pool: PgPool) {
        let user = fixtures::volunteer(&pool, "masha").await;
        let started = TaskStatus::InProgress;
        let (post, _) = fixtures::task(&pool, "Post", TaskType::Smm, started, &[]).await;
        let (video, _) = fixtures::task(&pool, "Video", TaskType::Smm, started, &[]).await;
        for task in [&post, &video] {
            assign(&pool, generate_id(), task.id, user.id, AssignmentRole::Executor)
                .await
                .unwrap();
        }

        let (rated, after) = rate(&pool, post.id, user.id, 5, Some("great"), 120).await.unwrap();
        assert_eq!(rated.rating, Some(5));
        assert_eq!(rated.points_awarded, 120);
        assert_eq!((after.points, after.level, after.role), (120, 2, Role::Member));

        let err = rate(&pool, post.id, user.id, 1, None, 999).await.unwrap_err();
        assert!(matches!(err, HubError::AlreadyExists { .. }), "{err:?}");
        let stored = users::find_by_id(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(stored.points, 120);

        let (_, after) = rate(&pool, video.id, user.id, 4, None, 400).await.unwrap();
        assert_eq!((after.points, after.level, after.role), (520, 5, Role::Active));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn reviving_cancelled_assignment_clears_old_rating(pool: PgPool) {
        let user = fixtures::volunteer(&pool, "petya").await;
        let started = TaskStatus::InProgress;
        let (task, _) = fixtures::task(&pool, "Banner", TaskType::Design, started, &[]).await;

        assign(&pool, generate_id(), task.id, user.id, AssignmentRole::Executor)
            .await
            .unwrap();
        rate(&pool, task.id, user.id, 3, Some("late"), 30).await.unwrap();
        set_status(&pool, task.id, user.id, AssignmentStatus::Assigned, AssignmentStatus::Cancelled)
            .await
            .unwrap()
            .unwrap();

        let again = assign(&pool, generate_id(), task.id, user.id, AssignmentRole::Executor).await;
        assert!(again.is_ok(), "{again:?}");
        let revived = find(&pool, task.id, user.id).await.unwrap().unwrap();
        assert_eq!(revived.status, AssignmentStatus::Assigned);
        assert_eq!(revived.role_in_task, AssignmentRole::Executor);
        assert_eq!((revived.rating, revived.feedback.as_deref()), (None, None));
        assert_eq!(revived.points_awarded, 0);
        assert_eq!(revived.completed_at, None);

        let (rated, user) = rate(&pool, task.id, user.id, 5, None, 50).await.unwrap();
        assert_eq!(rated.rating, Some(5));
        assert_eq!(user.points, 80);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn active_assignment_is_a_conflict(pool: PgPool) {
        let user = fixtures::volunteer(&pool, "olya").await;
        let (task, _) = fixtures::task(&pool, "Post", TaskType::Smm, TaskStatus::Open, &[]).await;
        assign(&pool, generate_id(), task.id, user.id, AssignmentRole::Executor)
            .await
            .unwrap();

        let err = assign(&pool, generate_id(), task.id, user.id, AssignmentRole::Lead)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::AlreadyExists { .. }));
        assert_eq!(list_for_task(&pool, task.id).await.unwrap().len(), 1);
    }
}
