//! In-app notification routes.

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use prhub_common::{
    error::{HubError, HubResult},
    models::{BroadcastRequest, NewNotification, Notification, NotificationFilter, NotificationKind},
    pagination::{Page, PageParams},
    permissions::Permissions,
    validation::validate_request,
};
use prhub_db::repository::{notifications, users};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, middleware::AuthContext, notify, routes::page_window};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/broadcast", post(broadcast))
        .route("/notifications/{notification_id}", delete(delete_notification))
        .route("/notifications/{notification_id}/read", post(mark_read))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth_middleware,
        ))
}

#[derive(Serialize)]
struct CountResponse {
    count: i64,
}

#[derive(Serialize)]
struct BroadcastResponse {
    recipients: usize,
}

/// GET /api/v1/notifications?unread_only=
async fn list_notifications(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
    Query(filter): Query<NotificationFilter>,
) -> HubResult<Json<Page<Notification>>> {
    let (offset, limit) = page_window(&page);
    let (items, total) =
        notifications::list_for_user(&state.db.pg, auth.user_id, filter.unread_only, offset, limit)
            .await?;
    Ok(Json(Page::new(items, total, offset, limit)))
}

/// GET /api/v1/notifications/unread-count
async fn unread_count(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> HubResult<Json<CountResponse>> {
    let count = notifications::unread_count(&state.db.pg, auth.user_id).await?;
    Ok(Json(CountResponse { count }))
}

/// POST /api/v1/notifications/:notification_id/read
async fn mark_read(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<Uuid>,
) -> HubResult<Json<Notification>> {
    let notification = notifications::mark_read(&state.db.pg, auth.user_id, notification_id)
        .await?
        .ok_or_else(|| HubError::not_found("Notification"))?;
    Ok(Json(notification))
}

/// POST /api/v1/notifications/read-all
async fn mark_all_read(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> HubResult<Json<CountResponse>> {
    let updated = notifications::mark_all_read(&state.db.pg, auth.user_id).await?;
    Ok(Json(CountResponse {
        count: i64::try_from(updated).unwrap_or(i64::MAX),
    }))
}

/// DELETE /api/v1/notifications/:notification_id
async fn delete_notification(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<Uuid>,
) -> HubResult<StatusCode> {
    if !notifications::delete_notification(&state.db.pg, auth.user_id, notification_id).await? {
        return Err(HubError::not_found("Notification"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/notifications/broadcast - Announcement to every active member
/// (optionally one role). Delivery continues in the background.
async fn broadcast(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<BroadcastRequest>,
) -> HubResult<(StatusCode, Json<BroadcastResponse>)> {
    auth.require(Permissions::BROADCAST)?;
    validate_request(&body)?;

    let recipients = users::list_active_ids(&state.db.pg, body.role).await?;
    let count = recipients.iter().filter(|id| **id != auth.user_id).count();

    tracing::info!(
        by = %auth.user_id,
        role = ?body.role,
        recipients = count,
        "Broadcast queued"
    );

    let title = body.title.trim().to_string();
    let message = body.message.trim().to_string();
    notify::spawn_many(&state, recipients, Some(auth.user_id), move |user_id| {
        NewNotification::new(user_id, NotificationKind::System, title.clone(), message.clone())
    });

    Ok((StatusCode::ACCEPTED, Json(BroadcastResponse { recipients: count })))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn unread_count_requires_auth() {
        let response = test_support::app()
            .oneshot(
                Request::get("/api/v1/notifications/unread-count")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
