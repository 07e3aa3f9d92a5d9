//! Repository layer: query functions organized by domain.
//!
//! Plain lookups return `sqlx::Error`; operations that enforce business rules
//! inside a transaction return [`HubResult`](prhub_common::error::HubResult).

pub mod assignments;
pub mod equipment;
pub mod equipment_requests;
pub mod files;
pub mod gallery;
pub mod moderation;
pub mod notifications;
pub mod stages;
pub mod tasks;
pub mod telegram;
pub mod templates;
pub mod users;

use prhub_common::error::HubError;

/// Map a unique violation to `AlreadyExists`, everything else to `Database`.
pub(crate) fn conflict(err: sqlx::Error, resource: &str) -> HubError {
    if crate::postgres::is_unique_violation(&err) {
        HubError::AlreadyExists {
            resource: resource.to_string(),
        }
    } else {
        HubError::Database(err)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use prhub_common::ids::generate_id;
    use prhub_common::models::{Task, TaskPriority, TaskStage, TaskStatus, TaskType, User};
    use sqlx::PgPool;

    use super::{tasks, users};

    /// An approved volunteer account with zero points.
    pub async fn volunteer(pool: &PgPool, username: &str) -> User {
        let user = users::create_admin(pool, generate_id(), username, "Test Volunteer", "x")
            .await
            .unwrap();
        users::assign_role(pool, user.id, prhub_common::models::Role::Novice)
            .await
            .unwrap()
    }

    pub async fn task(
        pool: &PgPool,
        title: &str,
        task_type: TaskType,
        status: TaskStatus,
        stages: &[&str],
    ) -> (Task, Vec<TaskStage>) {
        let stages: Vec<String> = stages.iter().map(|s| s.to_string()).collect();
        tasks::create_task(
            pool,
            &tasks::NewTask {
                id: generate_id(),
                title,
                description: None,
                task_type,
                priority: TaskPriority::Medium,
                status,
                due_date: None,
                created_by: None,
                template_id: None,
            },
            &stages,
        )
        .await
        .unwrap()
    }
}
