//! Member routes: profiles, the leaderboard, and VP4PR account management.

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
    models::{
        AssignRoleRequest, AwardPointsRequest, LeaderboardEntry, NewNotification,
        NotificationKind, UpdateProfileRequest, UserFilter, UserResponse,
    },
    pagination::{Page, PageParams},
    permissions::Permissions,
    validation::{validate_name, validate_request},
};
use prhub_db::repository::users;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, middleware::AuthContext, notify, routes::page_window};

const DEFAULT_LEADERBOARD_SIZE: i64 = 10;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/@me", get(get_me).patch(update_me))
        .route("/users/leaderboard", get(leaderboard))
        .route("/users/{user_id}", get(get_user).delete(delete_user))
        .route("/users/{user_id}/role", patch(assign_role))
        .route("/users/{user_id}/points", post(award_points))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth_middleware,
        ))
}

/// The caller's own profile, with the fields hidden from other members.
#[derive(Serialize)]
struct MeResponse {
    #[serde(flatten)]
    user: UserResponse,
    email: Option<String>,
    /// Permission bitset
    permissions: i64,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<i64>,
}

/// GET /api/v1/users - Directory of members (coordinators).
async fn list_users(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
    Query(filter): Query<UserFilter>,
) -> HubResult<Json<Page<UserResponse>>> {
    auth.require(Permissions::VIEW_USERS)?;

    let (offset, limit) = page_window(&page);
    let (items, total) = users::list_users(&state.db.pg, &filter, offset, limit).await?;
    Ok(Json(
        Page::new(items, total, offset, limit).map(UserResponse::from),
    ))
}

/// GET /api/v1/users/@me
async fn get_me(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> HubResult<Json<MeResponse>> {
    let user = users::find_by_id(&state.db.pg, auth.user_id)
        .await?
        .ok_or_else(|| HubError::not_found("User"))?;

    Ok(Json(MeResponse {
        email: user.email.clone(),
        permissions: auth.permissions.bits(),
        user: user.into(),
    }))
}

/// PATCH /api/v1/users/@me - Update own profile and consents.
async fn update_me(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateProfileRequest>,
) -> HubResult<Json<MeResponse>> {
    validate_request(&body)?;
    if let Some(name) = &body.full_name {
        validate_name(name, "Full name")?;
    }
    if body.consent_personal_data == Some(false) {
        return Err(HubError::validation(
            "Consent to personal data processing cannot be withdrawn here; ask a VP4PR to delete the account",
        ));
    }

    let user = users::update_profile(&state.db.pg, auth.user_id, &body).await?;
    tracing::info!(user_id = %auth.user_id, "Profile updated");

    Ok(Json(MeResponse {
        email: user.email.clone(),
        permissions: auth.permissions.bits(),
        user: user.into(),
    }))
}

/// GET /api/v1/users/leaderboard?limit=
async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> HubResult<Json<Vec<LeaderboardEntry>>> {
    let max = config::get().limits.max_page_size;
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_SIZE).clamp(1, max.max(1));
    Ok(Json(users::leaderboard(&state.db.pg, limit).await?))
}

/// GET /api/v1/users/:user_id
async fn get_user(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> HubResult<Json<UserResponse>> {
    let user = users::find_by_id(&state.db.pg, user_id)
        .await?
        .filter(|u| !u.is_deleted() || auth.has(Permissions::VIEW_USERS))
        .ok_or_else(|| HubError::not_found("User"))?;

    Ok(Json(user.into()))
}

/// PATCH /api/v1/users/:user_id/role - Assign a role (VP4PR).
async fn assign_role(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<AssignRoleRequest>,
) -> HubResult<Json<UserResponse>> {
    auth.require(Permissions::MANAGE_USERS)?;
    if user_id == auth.user_id {
        return Err(HubError::validation("You cannot change your own role"));
    }

    let user = users::assign_role(&state.db.pg, user_id, body.role).await?;

    tracing::info!(user_id = %user_id, role = %user.role, by = %auth.user_id, "Role assigned");
    notify::spawn(
        &state,
        NewNotification::new(
            user_id,
            NotificationKind::System,
            "Your role has changed",
            format!("You are now {}.", user.role),
        ),
    );

    Ok(Json(user.into()))
}

/// POST /api/v1/users/:user_id/points - Manual points adjustment.
async fn award_points(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<AwardPointsRequest>,
) -> HubResult<Json<UserResponse>> {
    auth.require(Permissions::AWARD_POINTS)?;
    validate_request(&body)?;
    validate_name(&body.reason, "Reason")?;
    if body.delta == 0 {
        return Err(HubError::validation("Delta must not be zero"));
    }
    if user_id == auth.user_id {
        return Err(HubError::validation("You cannot award points to yourself"));
    }

    let user = users::adjust_points(&state.db.pg, user_id, body.delta).await?;

    tracing::info!(user_id = %user_id, delta = body.delta, by = %auth.user_id, "Points adjusted");
    notify::spawn(
        &state,
        NewNotification::new(
            user_id,
            NotificationKind::Points,
            format!("{:+} points", body.delta),
            format!("{} Total: {} (level {}).", body.reason.trim(), user.points, user.level),
        )
        .with_payload(serde_json::json!({ "delta": body.delta, "points": user.points })),
    );

    Ok(Json(user.into()))
}

/// DELETE /api/v1/users/:user_id - Soft-delete an account (VP4PR).
async fn delete_user(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> HubResult<StatusCode> {
    auth.require(Permissions::MANAGE_USERS)?;
    if user_id == auth.user_id {
        return Err(HubError::validation("You cannot delete your own account"));
    }

    if !users::soft_delete(&state.db.pg, user_id).await? {
        return Err(HubError::not_found("User"));
    }

    tracing::info!(user_id = %user_id, by = %auth.user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
