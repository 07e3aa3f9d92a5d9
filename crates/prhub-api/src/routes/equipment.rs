//! Equipment inventory and booking routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use chrono::Utc;
use prhub_common::{
    error::{HubError, HubResult},
    ids,
    models::{
        Availability, AvailabilityQuery, BookingFilter, CreateBookingRequest,
        CreateEquipmentRequest, Equipment, EquipmentFilter, EquipmentRequest, EquipmentStatus,
        NewNotification, NotificationKind, RequestStatus, ReviewRequest, UpdateEquipmentRequest,
        available_quantity, check_availability,
    },
    pagination::{Page, PageParams},
    permissions::Permissions,
    validation::{validate_date_range, validate_name, validate_request},
};
use prhub_db::repository::{equipment, equipment_requests, tasks};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    AppState,
    middleware::AuthContext,
    notify,
    routes::{optional_json, page_window},
};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/equipment", get(list_equipment).post(create_equipment))
        .route(
            "/equipment/requests",
            get(list_requests).post(create_request),
        )
        .route("/equipment/requests/{request_id}", get(get_request))
        .route("/equipment/requests/{request_id}/approve", post(approve_request))
        .route("/equipment/requests/{request_id}/reject", post(reject_request))
        .route("/equipment/requests/{request_id}/issue", post(issue_request))
        .route("/equipment/requests/{request_id}/return", post(return_request))
        .route("/equipment/requests/{request_id}/cancel", post(cancel_request))
        .route(
            "/equipment/{equipment_id}",
            get(get_equipment)
                .patch(update_equipment)
                .delete(delete_equipment),
        )
        .route("/equipment/{equipment_id}/availability", get(availability))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth_middleware,
        ))
}

async fn load_equipment(state: &AppState, id: Uuid) -> HubResult<Equipment> {
    equipment::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| HubError::not_found("Equipment"))
}

async fn load_request(state: &AppState, id: Uuid) -> HubResult<EquipmentRequest> {
    equipment_requests::find_by_id(&state.db.pg, id)
        .await?
        .ok_or_else(|| HubError::not_found("Equipment request"))
}

// ============================================================
// Inventory
// ============================================================

/// GET /api/v1/equipment
async fn list_equipment(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
    Query(filter): Query<EquipmentFilter>,
) -> HubResult<Json<Page<Equipment>>> {
    auth.require(Permissions::VIEW_TASKS)?;

    let (offset, limit) = page_window(&page);
    let (items, total) = equipment::list_equipment(&state.db.pg, &filter, offset, limit).await?;
    Ok(Json(Page::new(items, total, offset, limit)))
}

/// POST /api/v1/equipment
async fn create_equipment(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateEquipmentRequest>,
) -> HubResult<(StatusCode, Json<Equipment>)> {
    auth.require(Permissions::MANAGE_EQUIPMENT)?;
    validate_request(&body)?;
    validate_name(&body.name, "Name")?;

    let item = equipment::create_equipment(
        &state.db.pg,
        ids::generate_id(),
        body.name.trim(),
        body.category,
        body.quantity,
        body.description.as_deref(),
    )
    .await?;

    tracing::info!(equipment_id = %item.id, name = %item.name, "Equipment added");
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/v1/equipment/:equipment_id
async fn get_equipment(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(equipment_id): Path<Uuid>,
) -> HubResult<Json<Equipment>> {
    auth.require(Permissions::VIEW_TASKS)?;
    Ok(Json(load_equipment(&state, equipment_id).await?))
}

/// PATCH /api/v1/equipment/:equipment_id
async fn update_equipment(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(equipment_id): Path<Uuid>,
    Json(body): Json<UpdateEquipmentRequest>,
) -> HubResult<Json<Equipment>> {
    auth.require(Permissions::MANAGE_EQUIPMENT)?;
    validate_request(&body)?;
    if let Some(name) = &body.name {
        validate_name(name, "Name")?;
    }

    let item = equipment::update_equipment(&state.db.pg, equipment_id, &body)
        .await?
        .ok_or_else(|| HubError::not_found("Equipment"))?;

    tracing::info!(equipment_id = %equipment_id, "Equipment updated");
    Ok(Json(item))
}

/// DELETE /api/v1/equipment/:equipment_id
async fn delete_equipment(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(equipment_id): Path<Uuid>,
) -> HubResult<StatusCode> {
    auth.require(Permissions::MANAGE_EQUIPMENT)?;

    if !equipment::delete_equipment(&state.db.pg, equipment_id).await? {
        return Err(HubError::not_found("Equipment"));
    }

    tracing::info!(equipment_id = %equipment_id, "Equipment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/equipment/:equipment_id/availability?start_date&end_date
async fn availability(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(equipment_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> HubResult<Json<Availability>> {
    auth.require(Permissions::VIEW_TASKS)?;
    validate_date_range(query.start_date, query.end_date)?;

    let item = load_equipment(&state, equipment_id).await?;
    let booked =
        equipment::booked_quantity(&state.db.pg, equipment_id, query.start_date, query.end_date)
            .await?;
    let available = if item.status == EquipmentStatus::Available {
        available_quantity(item.quantity, booked)
    } else {
        0
    };

    Ok(Json(Availability {
        equipment_id,
        start_date: query.start_date,
        end_date: query.end_date,
        total: item.quantity,
        booked,
        available,
    }))
}

// ============================================================
// Bookings
// ============================================================

/// POST /api/v1/equipment/requests - Ask for equipment for a date range.
///
/// Stock is checked here as a courtesy and again, under a row lock, when the
/// request is approved.
async fn create_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> HubResult<(StatusCode, Json<EquipmentRequest>)> {
    auth.require(Permissions::REQUEST_EQUIPMENT)?;
    validate_request(&body)?;
    validate_date_range(body.start_date, body.end_date)?;
    if body.start_date < Utc::now().date_naive() {
        return Err(HubError::validation("Bookings cannot start in the past"));
    }

    let item = load_equipment(&state, body.equipment_id).await?;
    if item.status != EquipmentStatus::Available {
        return Err(HubError::Unavailable {
            message: format!("{} is {}", item.name, item.status),
        });
    }
    if let Some(task_id) = body.task_id {
        tasks::find_by_id(&state.db.pg, task_id)
            .await?
            .ok_or_else(|| HubError::not_found("Task"))?;
    }

    let booked =
        equipment::booked_quantity(&state.db.pg, item.id, body.start_date, body.end_date).await?;
    check_availability(item.quantity, booked, body.quantity)?;

    let request = equipment_requests::create_request(
        &state.db.pg,
        &equipment_requests::NewBooking {
            id: ids::generate_id(),
            equipment_id: item.id,
            user_id: auth.user_id,
            task_id: body.task_id,
            quantity: body.quantity,
            start_date: body.start_date,
            end_date: body.end_date,
            purpose: body.purpose.as_deref(),
        },
    )
    .await?;

    tracing::info!(
        request_id = %request.id,
        equipment_id = %item.id,
        user_id = %auth.user_id,
        quantity = body.quantity,
        "Equipment requested"
    );
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/v1/equipment/requests - Own bookings; managers see everyone's.
async fn list_requests(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
    Query(filter): Query<BookingFilter>,
) -> HubResult<Json<Page<EquipmentRequest>>> {
    let scope = (!auth.has(Permissions::MANAGE_EQUIPMENT)).then_some(auth.user_id);

    let (offset, limit) = page_window(&page);
    let (items, total) =
        equipment_requests::list_requests(&state.db.pg, &filter, scope, offset, limit).await?;
    Ok(Json(Page::new(items, total, offset, limit)))
}

/// GET /api/v1/equipment/requests/:request_id
async fn get_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> HubResult<Json<EquipmentRequest>> {
    let request = load_request(&state, request_id).await?;
    if request.user_id != auth.user_id && !auth.has(Permissions::MANAGE_EQUIPMENT) {
        return Err(HubError::not_found("Equipment request"));
    }
    Ok(Json(request))
}

fn review_message(request: &EquipmentRequest, item: &str) -> (String, String) {
    let range = format!("{} to {}", request.start_date, request.end_date);
    let (title, verb) = match request.status {
        RequestStatus::Approved => ("Booking approved", "approved"),
        RequestStatus::Rejected => ("Booking rejected", "rejected"),
        RequestStatus::Active => ("Equipment issued", "issued to you"),
        RequestStatus::Returned => ("Equipment returned", "marked as returned"),
        RequestStatus::Cancelled => ("Booking cancelled", "cancelled"),
        RequestStatus::Pending => ("Booking pending", "pending"),
    };
    let mut message = format!("{} x{} for {range} was {verb}.", item, request.quantity);
    if let Some(comment) = request.review_comment.as_deref().filter(|c| !c.is_empty()) {
        message.push_str(&format!("\n{comment}"));
    }
    (title.to_string(), message)
}

/// Notify the requester about a decision they did not make themselves.
async fn notify_requester(state: &Arc<AppState>, request: &EquipmentRequest, actor: Uuid) {
    if request.user_id == actor {
        return;
    }
    let item = match equipment::find_by_id(&state.db.pg, request.equipment_id).await {
        Ok(Some(e)) => e.name,
        _ => "Equipment".to_string(),
    };
    let (title, message) = review_message(request, &item);
    notify::spawn(
        state,
        NewNotification::new(request.user_id, NotificationKind::Equipment, title, message)
            .with_payload(serde_json::json!({
                "request_id": request.id,
                "status": request.status,
            })),
    );
}

fn review_body(body: &[u8]) -> HubResult<ReviewRequest> {
    let review: ReviewRequest = optional_json(body)?;
    validate_request(&review)?;
    Ok(review)
}

/// POST /api/v1/equipment/requests/:request_id/approve
async fn approve_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    body: Bytes,
) -> HubResult<Json<EquipmentRequest>> {
    auth.require(Permissions::MANAGE_EQUIPMENT)?;
    let review = review_body(&body)?;

    let request =
        equipment_requests::approve(&state.db.pg, request_id, auth.user_id, review.comment.as_deref())
            .await?;

    tracing::info!(request_id = %request_id, by = %auth.user_id, "Booking approved");
    notify_requester(&state, &request, auth.user_id).await;
    Ok(Json(request))
}

async fn review_transition(
    state: &Arc<AppState>,
    auth: &AuthContext,
    request_id: Uuid,
    next: RequestStatus,
    body: &[u8],
) -> HubResult<Json<EquipmentRequest>> {
    auth.require(Permissions::MANAGE_EQUIPMENT)?;
    let review = review_body(body)?;

    let request = equipment_requests::transition(
        &state.db.pg,
        request_id,
        next,
        Some(auth.user_id),
        review.comment.as_deref(),
    )
    .await?;

    tracing::info!(request_id = %request_id, status = %next, by = %auth.user_id, "Booking updated");
    notify_requester(state, &request, auth.user_id).await;
    Ok(Json(request))
}

/// POST /api/v1/equipment/requests/:request_id/reject
async fn reject_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    body: Bytes,
) -> HubResult<Json<EquipmentRequest>> {
    review_transition(&state, &auth, request_id, RequestStatus::Rejected, &body).await
}

/// POST /api/v1/equipment/requests/:request_id/issue - Hand the equipment out.
async fn issue_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    body: Bytes,
) -> HubResult<Json<EquipmentRequest>> {
    review_transition(&state, &auth, request_id, RequestStatus::Active, &body).await
}

/// POST /api/v1/equipment/requests/:request_id/return
async fn return_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    body: Bytes,
) -> HubResult<Json<EquipmentRequest>> {
    review_transition(&state, &auth, request_id, RequestStatus::Returned, &body).await
}

/// POST /api/v1/equipment/requests/:request_id/cancel - Requester withdraws
/// (managers may cancel on their behalf).
async fn cancel_request(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> HubResult<Json<EquipmentRequest>> {
    let request = load_request(&state, request_id).await?;
    auth.require_self_or(request.user_id, Permissions::MANAGE_EQUIPMENT)?;

    let reviewer = (request.user_id != auth.user_id).then_some(auth.user_id);
    let request = equipment_requests::transition(
        &state.db.pg,
        request_id,
        RequestStatus::Cancelled,
        reviewer,
        None,
    )
    .await?;

    tracing::info!(request_id = %request_id, by = %auth.user_id, "Booking cancelled");
    notify_requester(&state, &request, auth.user_id).await;
    Ok(Json(request))
}
