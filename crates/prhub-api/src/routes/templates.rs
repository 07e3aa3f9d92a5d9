//! Task template routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use chrono::{Days, Utc};
use prhub_common::{
    error::{HubError, HubResult},
    ids,
    models::{
        CreateTemplateRequest, InstantiateTemplateRequest, TaskDetail, TaskPriority, TaskStatus,
        TaskTemplate, UpdateTemplateRequest,
    },
    pagination::{Page, PageParams},
    permissions::Permissions,
    validation::{validate_name, validate_request},
};
use prhub_db::repository::{tasks, templates};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    AppState,
    middleware::AuthContext,
    routes::{optional_json, page_window, tasks::validate_stage_names},
};

const DEFAULT_DURATION_DAYS: i32 = 7;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/{template_id}",
            get(get_template).patch(update_template).delete(delete_template),
        )
        .route("/templates/{template_id}/tasks", post(instantiate_template))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth_middleware,
        ))
}

/// Inactive templates are only visible to template managers.
async fn load_visible(state: &AppState, auth: &AuthContext, id: Uuid) -> HubResult<TaskTemplate> {
    templates::find_by_id(&state.db.pg, id)
        .await?
        .filter(|t| t.is_active || auth.has(Permissions::MANAGE_TEMPLATES))
        .ok_or_else(|| HubError::not_found("Template"))
}

/// GET /api/v1/templates
async fn list_templates(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
) -> HubResult<Json<Page<TaskTemplate>>> {
    auth.require(Permissions::VIEW_TASKS)?;

    let include_inactive = auth.has(Permissions::MANAGE_TEMPLATES);
    let (offset, limit) = page_window(&page);
    let (items, total) =
        templates::list_templates(&state.db.pg, include_inactive, offset, limit).await?;
    Ok(Json(Page::new(items, total, offset, limit)))
}

/// POST /api/v1/templates
async fn create_template(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTemplateRequest>,
) -> HubResult<(StatusCode, Json<TaskTemplate>)> {
    auth.require(Permissions::MANAGE_TEMPLATES)?;
    validate_request(&body)?;
    validate_name(&body.name, "Template name")?;
    validate_stage_names(&body.stages)?;

    let stages: Vec<String> = body.stages.iter().map(|s| s.trim().to_string()).collect();
    let template = templates::create_template(
        &state.db.pg,
        &templates::NewTemplate {
            id: ids::generate_id(),
            name: body.name.trim(),
            description: body.description.as_deref(),
            task_type: body.task_type,
            priority: body.priority.unwrap_or(TaskPriority::Medium),
            stages: &stages,
            default_duration_days: body.default_duration_days.unwrap_or(DEFAULT_DURATION_DAYS),
            created_by: auth.user_id,
        },
    )
    .await?;

    tracing::info!(template_id = %template.id, name = %template.name, "Template created");
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /api/v1/templates/:template_id
async fn get_template(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
) -> HubResult<Json<TaskTemplate>> {
    auth.require(Permissions::VIEW_TASKS)?;
    Ok(Json(load_visible(&state, &auth, template_id).await?))
}

/// PATCH /api/v1/templates/:template_id
async fn update_template(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
    Json(mut body): Json<UpdateTemplateRequest>,
) -> HubResult<Json<TaskTemplate>> {
    auth.require(Permissions::MANAGE_TEMPLATES)?;
    validate_request(&body)?;
    if let Some(name) = &body.name {
        validate_name(name, "Template name")?;
    }
    if let Some(stages) = body.stages.as_mut() {
        validate_stage_names(stages)?;
        for stage in stages.iter_mut() {
            *stage = stage.trim().to_string();
        }
    }

    let template = templates::update_template(&state.db.pg, template_id, &body)
        .await?
        .ok_or_else(|| HubError::not_found("Template"))?;

    tracing::info!(template_id = %template_id, "Template updated");
    Ok(Json(template))
}

/// DELETE /api/v1/templates/:template_id
async fn delete_template(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
) -> HubResult<StatusCode> {
    auth.require(Permissions::MANAGE_TEMPLATES)?;

    if !templates::delete_template(&state.db.pg, template_id).await? {
        return Err(HubError::not_found("Template"));
    }

    tracing::info!(template_id = %template_id, "Template deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/templates/:template_id/tasks - Create a task from a template.
///
/// The body is optional; `title`, `description` and `publish` override the
/// template's defaults.
async fn instantiate_template(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
    body: Bytes,
) -> HubResult<(StatusCode, Json<TaskDetail>)> {
    auth.require(Permissions::CREATE_TASKS)?;
    let body: InstantiateTemplateRequest = optional_json(&body)?;
    validate_request(&body)?;
    if let Some(title) = &body.title {
        validate_name(title, "Title")?;
    }

    let template = load_visible(&state, &auth, template_id).await?;
    if !template.is_active {
        return Err(HubError::validation(format!(
            "Template '{}' is inactive",
            template.name
        )));
    }

    let days = u64::try_from(template.default_duration_days).unwrap_or(0);
    let due_date = Utc::now().date_naive().checked_add_days(Days::new(days));

    let new = tasks::NewTask {
        id: ids::generate_id(),
        title: body.title.as_deref().map_or(template.name.as_str(), str::trim),
        description: body.description.as_deref().or(template.description.as_deref()),
        task_type: template.task_type,
        priority: template.priority,
        status: if body.publish {
            TaskStatus::Open
        } else {
            TaskStatus::Draft
        },
        due_date,
        created_by: Some(auth.user_id),
        template_id: Some(template.id),
    };
    let (task, stages) = tasks::create_task(&state.db.pg, &new, &template.stages.0).await?;

    tracing::info!(
        task_id = %task.id,
        template_id = %template.id,
        created_by = %auth.user_id,
        "Task created from template"
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
