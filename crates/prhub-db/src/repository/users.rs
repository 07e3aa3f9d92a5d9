//! User repository: accounts, registration state and progress.

use prhub_common::error::{HubError, HubResult};
use prhub_common::gamification;
use prhub_common::models::{
    LeaderboardEntry, ModerationEntry, ModerationItemType, RegistrationStatus, Role,
    UpdateProfileRequest, User, UserFilter,
};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::conflict;

/// Fields collected by Telegram registration.
#[derive(Debug, Clone)]
pub struct NewTelegramUser<'a> {
    pub telegram_id: i64,
    pub telegram_username: Option<&'a str>,
    pub username: &'a str,
    pub full_name: &'a str,
    pub group_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub consent_personal_data: bool,
    pub consent_photo: bool,
}

/// Create an approved VP4PR account with a password (CLI bootstrap).
pub async fn create_admin(
    pool: &PgPool,
    id: Uuid,
    username: &str,
    full_name: &str,
    password_hash: &str,
) -> HubResult<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, username, full_name, password_hash, role, registration_status,
                           consent_personal_data, consent_given_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'vp4pr', 'approved', TRUE, NOW(), NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(full_name)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict(e, "username"))
}

/// Create a pending user and its registration moderation entry atomically.
pub async fn register_telegram_user(
    pool: &PgPool,
    id: Uuid,
    moderation_id: Uuid,
    new: &NewTelegramUser<'_>,
) -> HubResult<(User, ModerationEntry)> {
    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, telegram_id, telegram_username, username, full_name, group_name, email,
                           consent_personal_data, consent_photo, consent_given_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                CASE WHEN $8 THEN NOW() END, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(new.telegram_id)
    .bind(new.telegram_username)
    .bind(new.username)
    .bind(new.full_name)
    .bind(new.group_name)
    .bind(new.email)
    .bind(new.consent_personal_data)
    .bind(new.consent_photo)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict(e, "Telegram account"))?;

    let payload = serde_json::json!({
        "full_name": user.full_name,
        "username": user.username,
        "telegram_username": user.telegram_username,
        "group_name": user.group_name,
    });
    let entry = super::moderation::create_entry(
        &mut *tx,
        moderation_id,
        ModerationItemType::Registration,
        user.id,
        user.id,
        payload,
    )
    .await?;

    tx.commit().await?;
    Ok((user, entry))
}

/// Find a user by their unique ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Find a user by username (case-insensitive).
pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER($1)")
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// Username lookup for sign-in; soft-deleted accounts are invisible.
pub async fn find_active_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE LOWER(username) = LOWER($1) AND deleted_at IS NULL",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_telegram_id(pool: &PgPool, telegram_id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE telegram_id = $1")
        .bind(telegram_id)
        .fetch_optional(pool)
        .await
}

/// Member directory with filters. Returns the page and the filtered total.
pub async fn list_users(
    pool: &PgPool,
    filter: &UserFilter,
    offset: i64,
    limit: i64,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    const WHERE: &str = r#"
        WHERE ($1::text IS NULL OR role = $1)
          AND ($2::text IS NULL OR registration_status = $2)
          AND ($3::text IS NULL OR full_name ILIKE '%' || $3 || '%' OR username ILIKE '%' || $3 || '%')
          AND ($4 OR deleted_at IS NULL)
    "#;
    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT * FROM users {WHERE} ORDER BY full_name, id OFFSET $5 LIMIT $6"
    ))
    .bind(filter.role)
    .bind(filter.registration_status)
    .bind(search)
    .bind(filter.include_deleted)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM users {WHERE}"))
        .bind(filter.role)
        .bind(filter.registration_status)
        .bind(search)
        .bind(filter.include_deleted)
        .fetch_one(pool)
        .await?;

    Ok((users, total.0))
}

/// Approved, active members ordered by points.
pub async fn leaderboard(pool: &PgPool, limit: i64) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT id, full_name, role, points, level FROM users
        WHERE deleted_at IS NULL AND registration_status = 'approved'
        ORDER BY points DESC, created_at ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Update self-service profile fields. Granting personal-data consent stamps
/// `consent_given_at`.
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    req: &UpdateProfileRequest,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            full_name = COALESCE($2, full_name),
            group_name = COALESCE($3, group_name),
            email = COALESCE($4, email),
            consent_given_at = CASE
                WHEN $5 IS TRUE AND NOT consent_personal_data THEN NOW()
                WHEN $5 IS FALSE THEN NULL
                ELSE consent_given_at
            END,
            consent_personal_data = COALESCE($5, consent_personal_data),
            consent_photo = COALESCE($6, consent_photo),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.full_name.as_deref().map(str::trim))
    .bind(req.group_name.as_deref())
    .bind(req.email.as_deref())
    .bind(req.consent_personal_data)
    .bind(req.consent_photo)
    .fetch_one(pool)
    .await
}

/// Record that the user made an authenticated request.
pub async fn touch_activity(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_activity_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_registration_status(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    status: RegistrationStatus,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET registration_status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(executor)
    .await
}

/// Soft delete. Returns false when the user was already gone.
pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Ids of approved, non-deleted users, optionally limited to one role.
pub async fn list_active_ids(pool: &PgPool, role: Option<Role>) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM users
        WHERE deleted_at IS NULL AND registration_status = 'approved'
          AND ($1::text IS NULL OR role = $1)
        "#,
    )
    .bind(role)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Apply a points delta and optional role assignment to a locked user row.
///
/// Must run inside a transaction; the row stays locked until it commits.
pub async fn apply_progress(
    conn: &mut PgConnection,
    id: Uuid,
    delta: i32,
    assigned_role: Option<Role>,
) -> HubResult<User> {
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| HubError::not_found("User"))?;

    let progress = gamification::apply_points(user.points, user.role, delta, assigned_role);

    let updated = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET points = $2, level = $3, role = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(progress.points)
    .bind(progress.level)
    .bind(progress.role)
    .fetch_one(&mut *conn)
    .await?;

    Ok(updated)
}

/// Manual points award (positive or negative).
pub async fn adjust_points(pool: &PgPool, id: Uuid, delta: i32) -> HubResult<User> {
    let mut tx = pool.begin().await?;
    let user = apply_progress(&mut tx, id, delta, None).await?;
    tx.commit().await?;
    Ok(user)
}

/// Assign a role. Coarse roles fall back to what the user's points earn.
pub async fn assign_role(pool: &PgPool, id: Uuid, role: Role) -> HubResult<User> {
    let mut tx = pool.begin().await?;
    let user = apply_progress(&mut tx, id, 0, Some(role)).await?;
    tx.commit().await?;
    Ok(user)
}
