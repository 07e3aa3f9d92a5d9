//! Task routes: the task board, stage pipelines, assignments, ratings and
//! per-task Telegram topics.

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
};
use prhub_common::{
    config,
    error::{HubError, HubResult},
    gamification,
    ids,
    models::{
        AssignUserRequest, AssignmentRole, AssignmentStatus, ChangeAssignmentStatusRequest,
        ChangeTaskStatusRequest, CreateStageRequest, CreateTaskRequest, NewNotification,
        NotificationKind, RateAssignmentRequest, Task, TaskAssignment, TaskDetail,
        TaskFilter, TaskPriority, TaskStage, TaskStatus, TelegramChat, UpdateStageRequest,
        UpdateTaskRequest, all_stages_done, check_stage_transition,
    },
    pagination::{Page, PageParams},
    permissions::Permissions,
    validation::{validate_name, validate_request},
};
use prhub_db::repository::{assignments, stages, tasks, telegram as telegram_repo, users};
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, middleware::AuthContext, notify, routes::page_window};

/// Telegram caps forum topic names at 128 characters.
const TOPIC_NAME_MAX_CHARS: usize = 128;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/my", get(my_tasks))
        .route(
            "/tasks/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/{task_id}/status", post(change_status))
        .route("/tasks/{task_id}/stages", get(list_stages).post(create_stage))
        .route(
            "/tasks/{task_id}/stages/{stage_id}",
            patch(update_stage).delete(delete_stage),
        )
        .route(
            "/tasks/{task_id}/assignments",
            get(list_assignments).post(assign_user),
        )
        .route("/tasks/{task_id}/take", post(take_task))
        .route(
            "/tasks/{task_id}/assignments/{user_id}",
            axum::routing::delete(remove_assignment),
        )
        .route(
            "/tasks/{task_id}/assignments/{user_id}/status",
            post(change_assignment_status),
        )
        .route("/tasks/{task_id}/assignments/{user_id}/rate", post(rate_assignment))
        .route("/tasks/{task_id}/chat", post(create_chat))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth_middleware,
        ))
}

// ============================================================
// Helpers
// ============================================================

async fn load_task(state: &AppState, task_id: Uuid) -> HubResult<Task> {
    tasks::find_by_id(&state.db.pg, task_id)
        .await?
        .ok_or_else(|| HubError::not_found("Task"))
}

async fn load_detail(state: &AppState, task: Task) -> HubResult<TaskDetail> {
    let stages = stages::list_for_task(&state.db.pg, task.id).await?;
    let assignments = assignments::list_for_task(&state.db.pg, task.id).await?;
    Ok(TaskDetail {
        task,
        stages,
        assignments,
    })
}

async fn is_active_assignee(state: &AppState, task_id: Uuid, user_id: Uuid) -> HubResult<bool> {
    Ok(matches!(
        assignments::find(&state.db.pg, task_id, user_id).await?,
        Some(a) if a.status != AssignmentStatus::Cancelled
    ))
}

fn ensure_editable(task: &Task) -> HubResult<()> {
    if task.status.is_terminal() {
        return Err(HubError::validation(format!(
            "Task {} is {} and can no longer be changed",
            task.task_number, task.status
        )));
    }
    Ok(())
}

pub(crate) fn validate_stage_names(names: &[String]) -> HubResult<()> {
    for name in names {
        validate_name(name, "Stage name")?;
        if name.trim().chars().count() > 100 {
            return Err(HubError::validation("Stage name must be 1-100 characters"));
        }
    }
    Ok(())
}

/// Tell the active team (minus the actor) that the task moved.
async fn announce_status(state: &Arc<AppState>, task: &Task, actor: Option<Uuid>) {
    let recipients = match assignments::active_user_ids(&state.db.pg, task.id).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(task_id = %task.id, "Failed to load assignees: {e}");
            return;
        }
    };
    let (task_id, number, title, status) = (
        task.id,
        task.task_number.clone(),
        task.title.clone(),
        task.status,
    );
    notify::spawn_many(state, recipients, actor, move |user_id| {
        NewNotification::new(
            user_id,
            NotificationKind::TaskStatus,
            format!("{number}: {status}"),
            format!("\"{title}\" is now {status}."),
        )
        .with_payload(serde_json::json!({ "task_id": task_id, "status": status }))
    });
}

// ============================================================
// Tasks
// ============================================================

/// GET /api/v1/tasks
async fn list_tasks(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
    Query(filter): Query<TaskFilter>,
) -> HubResult<Json<Page<Task>>> {
    auth.require(Permissions::VIEW_TASKS)?;

    let (offset, limit) = page_window(&page);
    let (items, total) = tasks::list_tasks(&state.db.pg, &filter, offset, limit).await?;
    Ok(Json(Page::new(items, total, offset, limit)))
}

/// GET /api/v1/tasks/my - Tasks the caller is assigned to.
async fn my_tasks(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
    Query(mut filter): Query<TaskFilter>,
) -> HubResult<Json<Page<Task>>> {
    filter.assignee_id = Some(auth.user_id);

    let (offset, limit) = page_window(&page);
    let (items, total) = tasks::list_tasks(&state.db.pg, &filter, offset, limit).await?;
    Ok(Json(Page::new(items, total, offset, limit)))
}

/// POST /api/v1/tasks
async fn create_task(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskRequest>,
) -> HubResult<(StatusCode, Json<TaskDetail>)> {
    auth.require(Permissions::CREATE_TASKS)?;
    validate_request(&body)?;
    validate_name(&body.title, "Title")?;
    validate_stage_names(&body.stages)?;

    let new = tasks::NewTask {
        id: ids::generate_id(),
        title: body.title.trim(),
        description: body.description.as_deref(),
        task_type: body.task_type,
        priority: body.priority.unwrap_or(TaskPriority::Medium),
        status: if body.publish {
            TaskStatus::Open
        } else {
            TaskStatus::Draft
        },
        due_date: body.due_date,
        created_by: Some(auth.user_id),
        template_id: None,
    };
    let stage_names: Vec<String> = body.stages.iter().map(|s| s.trim().to_string()).collect();
    let (task, stages) = tasks::create_task(&state.db.pg, &new, &stage_names).await?;

    tracing::info!(
        task_id = %task.id,
        task_number = %task.task_number,
        created_by = %auth.user_id,
        "Task created"
    );

    Ok((
        StatusCode::CREATED,
        Json(TaskDetail {
            task,
            stages,
            assignments: Vec::new(),
        }),
    ))
}

/// GET /api/v1/tasks/:task_id
async fn get_task(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> HubResult<Json<TaskDetail>> {
    auth.require(Permissions::VIEW_TASKS)?;
    let task = load_task(&state, task_id).await?;
    Ok(Json(load_detail(&state, task).await?))
}

/// PATCH /api/v1/tasks/:task_id
async fn update_task(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<UpdateTaskRequest>,
) -> HubResult<Json<Task>> {
    auth.require(Permissions::MANAGE_TASKS)?;
    validate_request(&body)?;
    if let Some(title) = &body.title {
        validate_name(title, "Title")?;
    }

    let task = load_task(&state, task_id).await?;
    ensure_editable(&task)?;

    let task = tasks::update_task(&state.db.pg, task_id, &body)
        .await?
        .ok_or_else(|| HubError::not_found("Task"))?;

    tracing::info!(task_id = %task_id, by = %auth.user_id, "Task updated");
    Ok(Json(task))
}

/// DELETE /api/v1/tasks/:task_id
async fn delete_task(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> HubResult<StatusCode> {
    auth.require(Permissions::MANAGE_TASKS)?;

    if !tasks::delete_task(&state.db.pg, task_id).await? {
        return Err(HubError::not_found("Task"));
    }

    tracing::info!(task_id = %task_id, by = %auth.user_id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tasks/:task_id/status
///
/// Assignees may start work and hand in for review; everything else needs
/// MANAGE_TASKS.
async fn change_status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<ChangeTaskStatusRequest>,
) -> HubResult<Json<Task>> {
    let task = load_task(&state, task_id).await?;

    if !auth.has(Permissions::MANAGE_TASKS) {
        let assignee_move = matches!(body.status, TaskStatus::InProgress | TaskStatus::Review);
        if !assignee_move || !is_active_assignee(&state, task_id, auth.user_id).await? {
            auth.require(Permissions::MANAGE_TASKS)?;
        }
    }

    let next = task.status.transition(body.status)?;
    let updated = tasks::set_status(&state.db.pg, task_id, task.status, next)
        .await?
        .ok_or_else(|| HubError::InvalidTransition {
            entity: "task".into(),
            from: task.status.to_string(),
            to: next.to_string(),
        })?;

    tracing::info!(
        task_id = %task_id,
        from = %task.status,
        to = %next,
        by = %auth.user_id,
        "Task status changed"
    );
    announce_status(&state, &updated, Some(auth.user_id)).await;

    Ok(Json(updated))
}

// ============================================================
// Stages
// ============================================================

/// GET /api/v1/tasks/:task_id/stages
async fn list_stages(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> HubResult<Json<Vec<TaskStage>>> {
    auth.require(Permissions::VIEW_TASKS)?;
    load_task(&state, task_id).await?;
    Ok(Json(stages::list_for_task(&state.db.pg, task_id).await?))
}

/// POST /api/v1/tasks/:task_id/stages - Append a stage to the pipeline.
async fn create_stage(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<CreateStageRequest>,
) -> HubResult<(StatusCode, Json<TaskStage>)> {
    auth.require(Permissions::MANAGE_TASKS)?;
    validate_request(&body)?;
    validate_name(&body.name, "Stage name")?;

    let task = load_task(&state, task_id).await?;
    ensure_editable(&task)?;

    let stage = stages::append_stage(
        &state.db.pg,
        ids::generate_id(),
        task_id,
        body.name.trim(),
        body.due_date,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(stage)))
}

/// PATCH /api/v1/tasks/:task_id/stages/:stage_id
///
/// Assignees may move stages along; renaming and rescheduling need
/// MANAGE_TASKS. Finishing the last open stage of an in-progress task sends
/// the task to review.
async fn update_stage(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path((task_id, stage_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateStageRequest>,
) -> HubResult<Json<TaskStage>> {
    validate_request(&body)?;
    if let Some(name) = &body.name {
        validate_name(name, "Stage name")?;
    }

    let task = load_task(&state, task_id).await?;
    let edits_details = body.name.is_some() || body.due_date.is_some();
    if edits_details || !is_active_assignee(&state, task_id, auth.user_id).await? {
        auth.require(Permissions::MANAGE_TASKS)?;
    }
    ensure_editable(&task)?;

    let stage = stages::find_stage(&state.db.pg, task_id, stage_id)
        .await?
        .ok_or_else(|| HubError::not_found("Stage"))?;

    if let Some(next) = body.status {
        let siblings = stages::list_for_task(&state.db.pg, task_id).await?;
        check_stage_transition(&siblings, &stage, next)?;
    }

    let updated = stages::update_stage(
        &state.db.pg,
        stage_id,
        stage.status,
        body.name.as_deref().map(str::trim),
        body.status,
        body.due_date,
    )
    .await?
    .ok_or_else(|| HubError::InvalidTransition {
        entity: "stage".into(),
        from: stage.status.to_string(),
        to: body.status.unwrap_or(stage.status).to_string(),
    })?;

    if body.status.is_some_and(|s| s.is_done()) && task.status == TaskStatus::InProgress {
        let pipeline = stages::list_for_task(&state.db.pg, task_id).await?;
        if all_stages_done(&pipeline) {
            if let Some(task) =
                tasks::set_status(&state.db.pg, task_id, TaskStatus::InProgress, TaskStatus::Review)
                    .await?
            {
                tracing::info!(task_id = %task_id, "All stages done; task sent to review");
                announce_status(&state, &task, None).await;
                if let Some(creator) = task.created_by.filter(|id| *id != auth.user_id) {
                    notify::spawn(
                        &state,
                        NewNotification::new(
                            creator,
                            NotificationKind::TaskStatus,
                            format!("{} is ready for review", task.task_number),
                            format!("Every stage of \"{}\" is finished.", task.title),
                        ),
                    );
                }
            }
        }
    }

    Ok(Json(updated))
}

/// DELETE /api/v1/tasks/:task_id/stages/:stage_id
async fn delete_stage(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path((task_id, stage_id)): Path<(Uuid, Uuid)>,
) -> HubResult<StatusCode> {
    auth.require(Permissions::MANAGE_TASKS)?;
    let task = load_task(&state, task_id).await?;
    ensure_editable(&task)?;

    if !stages::delete_stage(&state.db.pg, task_id, stage_id).await? {
        return Err(HubError::not_found("Stage"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Assignments
// ============================================================

/// GET /api/v1/tasks/:task_id/assignments
async fn list_assignments(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> HubResult<Json<Vec<TaskAssignment>>> {
    auth.require(Permissions::VIEW_TASKS)?;
    load_task(&state, task_id).await?;
    Ok(Json(assignments::list_for_task(&state.db.pg, task_id).await?))
}

/// POST /api/v1/tasks/:task_id/assignments - Assign a member.
async fn assign_user(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<AssignUserRequest>,
) -> HubResult<(StatusCode, Json<TaskAssignment>)> {
    auth.require(Permissions::MANAGE_TASKS)?;

    let task = load_task(&state, task_id).await?;
    ensure_editable(&task)?;

    users::find_by_id(&state.db.pg, body.user_id)
        .await?
        .filter(|u| u.can_authenticate())
        .ok_or_else(|| HubError::not_found("User"))?;

    let assignment = assignments::assign(
        &state.db.pg,
        ids::generate_id(),
        task_id,
        body.user_id,
        body.role_in_task.unwrap_or(AssignmentRole::Executor),
    )
    .await?;

    tracing::info!(task_id = %task_id, user_id = %body.user_id, by = %auth.user_id, "Member assigned");
    if body.user_id != auth.user_id {
        notify::spawn(
            &state,
            NewNotification::new(
                body.user_id,
                NotificationKind::TaskAssigned,
                format!("New task: {}", task.task_number),
                format!("You were assigned to \"{}\" as {}.", task.title, assignment.role_in_task),
            )
            .with_payload(serde_json::json!({ "task_id": task_id })),
        );
    }

    Ok((StatusCode::CREATED, Json(assignment)))
}

/// POST /api/v1/tasks/:task_id/take - Self-assign as executor.
async fn take_task(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> HubResult<(StatusCode, Json<TaskAssignment>)> {
    auth.require(Permissions::TAKE_TASKS)?;

    let task = load_task(&state, task_id).await?;
    if !matches!(task.status, TaskStatus::Open | TaskStatus::InProgress) {
        return Err(HubError::validation(format!(
            "Only open or in-progress tasks can be taken; {} is {}",
            task.task_number, task.status
        )));
    }

    let assignment = assignments::assign(
        &state.db.pg,
        ids::generate_id(),
        task_id,
        auth.user_id,
        AssignmentRole::Executor,
    )
    .await?;

    tracing::info!(task_id = %task_id, user_id = %auth.user_id, "Task taken");
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// DELETE /api/v1/tasks/:task_id/assignments/:user_id - Unassign (self or
/// MANAGE_TASKS). Rated assignments are kept.
async fn remove_assignment(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path((task_id, user_id)): Path<(Uuid, Uuid)>,
) -> HubResult<StatusCode> {
    auth.require_self_or(user_id, Permissions::MANAGE_TASKS)?;

    let assignment = assignments::find(&state.db.pg, task_id, user_id)
        .await?
        .ok_or_else(|| HubError::not_found("Assignment"))?;
    if assignment.rating.is_some() {
        return Err(HubError::validation("Rated assignments cannot be removed"));
    }

    if !assignments::remove(&state.db.pg, task_id, user_id).await? {
        return Err(HubError::not_found("Assignment"));
    }

    tracing::info!(task_id = %task_id, user_id = %user_id, by = %auth.user_id, "Assignment removed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tasks/:task_id/assignments/:user_id/status
async fn change_assignment_status(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path((task_id, user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ChangeAssignmentStatusRequest>,
) -> HubResult<Json<TaskAssignment>> {
    auth.require_self_or(user_id, Permissions::MANAGE_TASKS)?;

    let current = assignments::find(&state.db.pg, task_id, user_id)
        .await?
        .ok_or_else(|| HubError::not_found("Assignment"))?;

    let invalid = || HubError::InvalidTransition {
        entity: "assignment".into(),
        from: current.status.to_string(),
        to: body.status.to_string(),
    };
    if !current.status.can_transition_to(body.status) {
        return Err(invalid());
    }

    let updated = assignments::set_status(&state.db.pg, task_id, user_id, current.status, body.status)
        .await?
        .ok_or_else(invalid)?;

    tracing::info!(
        task_id = %task_id,
        user_id = %user_id,
        status = %updated.status,
        "Assignment status changed"
    );
    Ok(Json(updated))
}

/// POST /api/v1/tasks/:task_id/assignments/:user_id/rate
async fn rate_assignment(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path((task_id, user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<RateAssignmentRequest>,
) -> HubResult<Json<TaskAssignment>> {
    auth.require(Permissions::AWARD_POINTS)?;
    validate_request(&body)?;
    if user_id == auth.user_id {
        return Err(HubError::validation("You cannot rate your own work"));
    }

    let task = load_task(&state, task_id).await?;
    if !matches!(task.status, TaskStatus::Review | TaskStatus::Completed) {
        return Err(HubError::validation(format!(
            "Ratings open once the task is in review; {} is {}",
            task.task_number, task.status
        )));
    }

    let assignment = assignments::find(&state.db.pg, task_id, user_id)
        .await?
        .ok_or_else(|| HubError::not_found("Assignment"))?;
    if assignment.status == AssignmentStatus::Cancelled {
        return Err(HubError::validation("Cancelled assignments cannot be rated"));
    }
    if assignment.rating.is_some() {
        return Err(HubError::AlreadyExists {
            resource: "Rating".into(),
        });
    }

    let points = gamification::points_for_rating(task.priority, body.rating);
    let (assignment, user) = assignments::rate(
        &state.db.pg,
        task_id,
        user_id,
        body.rating,
        body.feedback.as_deref(),
        points,
    )
    .await?;

    tracing::info!(
        task_id = %task_id,
        user_id = %user_id,
        rating = body.rating,
        points,
        by = %auth.user_id,
        "Assignment rated"
    );
    notify::spawn(
        &state,
        NewNotification::new(
            user_id,
            NotificationKind::TaskRated,
            format!("{}: rated {}/5", task.task_number, body.rating),
            format!(
                "You earned {points} points for \"{}\". Total: {} (level {}).",
                task.title, user.points, user.level
            ),
        )
        .with_payload(serde_json::json!({
            "task_id": task_id,
            "rating": body.rating,
            "points": points,
        })),
    );

    Ok(Json(assignment))
}

// ============================================================
// Telegram topic
// ============================================================

fn topic_name(task: &Task) -> String {
    format!("{} {}", task.task_number, task.title)
        .chars()
        .take(TOPIC_NAME_MAX_CHARS)
        .collect()
}

/// POST /api/v1/tasks/:task_id/chat - Open a forum topic for the task in
/// the department chat.
async fn create_chat(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> HubResult<(StatusCode, Json<TelegramChat>)> {
    auth.require(Permissions::MANAGE_TASKS)?;

    let bot = state.telegram.clone().ok_or_else(|| HubError::Unavailable {
        message: "Telegram integration is not configured".into(),
    })?;
    let chat_id = config::get()
        .telegram
        .department_chat_id
        .ok_or_else(|| HubError::Unavailable {
            message: "Department chat is not configured".into(),
        })?;

    let task = load_task(&state, task_id).await?;
    if telegram_repo::find_chat_for_task(&state.db.pg, task_id)
        .await?
        .is_some()
    {
        return Err(HubError::AlreadyExists {
            resource: "Task chat".into(),
        });
    }

    let name = topic_name(&task);
    let topic = bot
        .create_forum_topic(chat_id, &name)
        .await
        .map_err(|e| HubError::External {
            service: "Telegram".into(),
            message: e.to_string(),
        })?;

    let chat = telegram_repo::create_chat(
        &state.db.pg,
        ids::generate_id(),
        chat_id,
        Some(topic.message_thread_id),
        task_id,
        &topic.name,
    )
    .await?;

    tracing::info!(task_id = %task_id, chat_id, thread_id = topic.message_thread_id, "Task topic created");

    let intro = match &task.description {
        Some(d) if !d.trim().is_empty() => format!("{name}\n\n{}", d.trim()),
        _ => name,
    };
    if let Err(e) = bot
        .send_message(chat_id, &intro, Some(topic.message_thread_id))
        .await
    {
        tracing::warn!(task_id = %task_id, "Failed to post topic intro: {e}");
    }

    Ok((StatusCode::CREATED, Json(chat)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use prhub_common::models::TaskType;

    fn task(title: &str) -> Task {
        Task {
            id: Uuid::nil(),
            task_number: "PR-2026-0001".into(),
            title: title.into(),
            description: None,
            task_type: TaskType::Design,
            status: TaskStatus::Open,
            priority: TaskPriority::Medium,
            due_date: None,
            created_by: None,
            template_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn topic_names_are_capped() {
        assert_eq!(topic_name(&task("Poster")), "PR-2026-0001 Poster");
        let long = task(&"я".repeat(300));
        assert_eq!(topic_name(&long).chars().count(), TOPIC_NAME_MAX_CHARS);
    }

    #[test]
    fn terminal_tasks_are_frozen() {
        let mut t = task("Poster");
        assert!(ensure_editable(&t).is_ok());
        t.status = TaskStatus::Completed;
        assert!(ensure_editable(&t).is_err());
        t.status = TaskStatus::Cancelled;
        assert!(ensure_editable(&t).is_err());
    }

    #[test]
    fn stage_names_must_be_present() {
        assert!(validate_stage_names(&["Draft".into(), "Layout".into()]).is_ok());
        assert!(validate_stage_names(&["  ".into()]).is_err());
        assert!(validate_stage_names(&["x".repeat(101)]).is_err());
    }
}
