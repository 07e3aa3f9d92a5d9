//! Tasks, their ordered stages, and per-member assignments.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::text_enum;
use crate::error::HubError;

text_enum! {
    /// Which PR direction a task belongs to.
    pub enum TaskType {
        Smm => "smm",
        Design => "design",
        Channel => "channel",
        Prfr => "prfr",
        Multitype => "multitype",
    }
}

text_enum! {
    pub enum TaskPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

text_enum! {
    /// Task lifecycle. Moves forward only; `Cancelled` is reachable from any
    /// non-terminal state.
    pub enum TaskStatus {
        Draft => "draft",
        Open => "open",
        InProgress => "in_progress",
        Review => "review",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl TaskStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Open => 1,
            Self::InProgress => 2,
            Self::Review => 3,
            Self::Completed => 4,
            Self::Cancelled => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        next == Self::Cancelled || next.rank() > self.rank()
    }

    pub fn transition(&self, next: TaskStatus) -> Result<TaskStatus, HubError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(invalid("task", self.as_str(), next.as_str()))
        }
    }
}

text_enum! {
    pub enum StageStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Skipped => "skipped",
    }
}

impl StageStatus {
    /// Finished stages no longer block the ones after them.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Skipped)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Skipped)
        )
    }
}

text_enum! {
    pub enum AssignmentRole {
        Executor => "executor",
        Reviewer => "reviewer",
        Lead => "lead",
    }
}

text_enum! {
    pub enum AssignmentStatus {
        Assigned => "assigned",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl AssignmentStatus {
    pub fn can_transition_to(&self, next: AssignmentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Assigned, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::Assigned, Self::Cancelled)
                | (Self::InProgress, Self::Cancelled)
        )
    }
}

pub(crate) fn invalid(entity: &str, from: &str, to: &str) -> HubError {
    HubError::InvalidTransition {
        entity: entity.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// A unit of department work.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    /// Human-facing number, e.g. `PR-2026-0042`
    pub task_number: String,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Format the human-facing task number.
pub fn format_task_number(year: i32, seq: i64) -> String {
    format!("PR-{year}-{seq:04}")
}

/// An ordered pipeline step of a task.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskStage {
    pub id: Uuid,
    pub task_id: Uuid,
    pub name: String,
    pub stage_order: i32,
    pub status: StageStatus,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Check whether `stage` may move to `next` given its siblings.
///
/// Starting or completing a stage requires every earlier stage to be done;
/// skipping is always allowed from a non-finished state.
pub fn check_stage_transition(
    stages: &[TaskStage],
    stage: &TaskStage,
    next: StageStatus,
) -> Result<(), HubError> {
    if !stage.status.can_transition_to(next) {
        return Err(invalid("stage", stage.status.as_str(), next.as_str()));
    }
    if matches!(next, StageStatus::InProgress | StageStatus::Completed) {
        if let Some(blocker) = stages
            .iter()
            .filter(|s| s.stage_order < stage.stage_order)
            .find(|s| !s.status.is_done())
        {
            return Err(HubError::Validation {
                message: format!(
                    "Stage '{}' must be completed or skipped first",
                    blocker.name
                ),
            });
        }
    }
    Ok(())
}

/// True when every stage is completed or skipped (and there is at least one).
pub fn all_stages_done(stages: &[TaskStage]) -> bool {
    !stages.is_empty() && stages.iter().all(|s| s.status.is_done())
}

/// A member's participation in a task.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskAssignment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub role_in_task: AssignmentRole,
    pub status: AssignmentStatus,
    pub rating: Option<i16>,
    pub feedback: Option<String>,
    pub points_awarded: i32,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Task with its pipeline and team, returned by `GET /tasks/{id}`.
#[derive(Debug, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub stages: Vec<TaskStage>,
    pub assignments: Vec<TaskAssignment>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 10_000))]
    pub description: Option<String>,

    pub task_type: TaskType,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    /// Start as `open` instead of `draft`
    #[serde(default)]
    pub publish: bool,
    /// Stage names in pipeline order
    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 stages"))]
    pub stages: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 10_000))]
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeTaskStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStageRequest {
    #[validate(length(min = 1, max = 100, message = "Stage name must be 1-100 characters"))]
    pub name: String,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStageRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub status: Option<StageStatus>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AssignUserRequest {
    pub user_id: Uuid,
    pub role_in_task: Option<AssignmentRole>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeAssignmentStatusRequest {
    pub status: AssignmentStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RateAssignmentRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be 1-5"))]
    pub rating: i16,

    #[validate(length(max = 2000))]
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(order: i32, status: StageStatus) -> TaskStage {
        TaskStage {
            id: Uuid::now_v7(),
            task_id: Uuid::nil(),
            name: format!("stage {order}"),
            stage_order: order,
            status,
            due_date: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn task_status_moves_forward_only() {
        use TaskStatus::*;
        assert!(Draft.can_transition_to(Open));
        assert!(Open.can_transition_to(Review));
        assert!(Review.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Open));
        assert!(!Review.can_transition_to(InProgress));
        assert!(!Open.can_transition_to(Open));
    }

    #[test]
    fn task_cancel_and_terminal_states() {
        use TaskStatus::*;
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Review.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Open));

        let err = Completed.transition(Open).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }

    #[test]
    fn stage_requires_earlier_stages_done() {
        let stages = vec![
            stage(0, StageStatus::Completed),
            stage(1, StageStatus::InProgress),
            stage(2, StageStatus::Pending),
        ];
        let err = check_stage_transition(&stages, &stages[2], StageStatus::InProgress).unwrap_err();
        assert!(err.to_string().contains("stage 1"));

        assert!(check_stage_transition(&stages, &stages[1], StageStatus::Completed).is_ok());
        // Skipping never waits on earlier stages.
        assert!(check_stage_transition(&stages, &stages[2], StageStatus::Skipped).is_ok());
    }

    #[test]
    fn skipped_stages_do_not_block() {
        let stages = vec![stage(0, StageStatus::Skipped), stage(1, StageStatus::Pending)];
        assert!(check_stage_transition(&stages, &stages[1], StageStatus::InProgress).is_ok());
    }

    #[test]
    fn finished_stages_are_frozen() {
        let stages = vec![stage(0, StageStatus::Completed)];
        let err = check_stage_transition(&stages, &stages[0], StageStatus::InProgress).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }

    #[test]
    fn all_done_needs_at_least_one_stage() {
        assert!(!all_stages_done(&[]));
        assert!(all_stages_done(&[stage(0, StageStatus::Completed), stage(1, StageStatus::Skipped)]));
        assert!(!all_stages_done(&[stage(0, StageStatus::Completed), stage(1, StageStatus::Pending)]));
    }

    #[test]
    fn stage_transition_table() {
        use StageStatus::*;
        let allowed = [
            (Pending, InProgress),
            (Pending, Skipped),
            (InProgress, Completed),
            (InProgress, Skipped),
        ];
        for &from in StageStatus::ALL {
            for &to in StageStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn stage_cannot_complete_without_starting() {
        let stages = vec![stage(0, StageStatus::Pending)];
        let err = check_stage_transition(&stages, &stages[0], StageStatus::Completed).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }

    #[test]
    fn assignment_transition_table() {
        use AssignmentStatus::*;
        let allowed = [
            (Assigned, InProgress),
            (InProgress, Completed),
            (Assigned, Cancelled),
            (InProgress, Cancelled),
        ];
        for &from in AssignmentStatus::ALL {
            for &to in AssignmentStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn task_numbers_are_zero_padded() {
        assert_eq!(format_task_number(2026, 7), "PR-2026-0007");
        assert_eq!(format_task_number(2026, 12345), "PR-2026-12345");
    }
}
