//! Authentication routes: password login for staff accounts, Telegram login
//! and registration, QR login sessions, and token refresh.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use prhub_common::{
    auth::{TokenKind, decode_claims},
    config,
    error::{HubError, HubResult},
    ids,
    models::{
        LoginRequest, QR_START_PREFIX, QrSessionStatus, TelegramAuthData, TelegramRegisterRequest,
        User, UserResponse, username_from_telegram,
    },
    validation::{validate_name, validate_request},
};
use prhub_db::{
    redis_pool,
    repository::{telegram as telegram_repo, users},
};
use prhub_telegram::{TelegramError, commands::deep_link, verify_login};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{self, TokenPair},
    notify,
};

/// Login attempts are counted per username over this window.
const LOGIN_WINDOW_SECS: u64 = 60;
const QR_TOKEN_LEN: usize = 32;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/telegram/register", post(telegram_register))
        .route("/auth/telegram/login", post(telegram_login))
        .route("/auth/qr", post(create_qr_session))
        .route("/auth/qr/{token}", get(poll_qr_session))
}

#[derive(Serialize)]
struct AuthResponse {
    user: UserResponse,
    #[serde(flatten)]
    tokens: TokenPair,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct RegistrationResponse {
    user: UserResponse,
    moderation_id: Uuid,
}

#[derive(Serialize)]
struct QrSessionResponse {
    session_token: String,
    deep_link: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct QrPollResponse {
    status: QrSessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserResponse>,
    #[serde(flatten)]
    tokens: Option<TokenPair>,
}

fn session_for(user: User) -> HubResult<AuthResponse> {
    let tokens = auth::issue_tokens(&user, &config::get().auth)?;
    Ok(AuthResponse {
        user: user.into(),
        tokens,
    })
}

/// Bot token, or `Unavailable` when Telegram is not configured.
fn bot_token() -> HubResult<&'static str> {
    let cfg = &config::get().telegram;
    if cfg.enabled() {
        Ok(&cfg.bot_token)
    } else {
        Err(HubError::Unavailable {
            message: "Telegram login is not configured".into(),
        })
    }
}

fn verify_telegram(data: &TelegramAuthData) -> HubResult<()> {
    let token = bot_token()?;
    let max_age = config::get().auth.telegram_auth_max_age_secs;
    verify_login(data, token, max_age).map_err(|e| match e {
        TelegramError::Stale => HubError::Expired {
            resource: "Telegram login data".into(),
        },
        _ => HubError::InvalidCredentials,
    })
}

/// Count a login attempt; Redis outages disable the limit rather than logins.
async fn check_login_rate(state: &AppState, username: &str) -> HubResult<()> {
    let Some(mut redis) = state.db.redis.clone() else {
        return Ok(());
    };
    let limit = i64::from(config::get().limits.login_attempts_per_minute);
    let key = redis_pool::login_attempts_key(username);

    let attempts = match redis_pool::incr_expire(&mut redis, &key, LOGIN_WINDOW_SECS).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!("Login rate limiter unavailable: {e}");
            return Ok(());
        }
    };

    if attempts > limit {
        let retry_after = redis_pool::ttl(&mut redis, &key)
            .await
            .ok()
            .flatten()
            .unwrap_or(LOGIN_WINDOW_SECS);
        return Err(HubError::RateLimited {
            retry_after_ms: retry_after * 1000,
        });
    }
    Ok(())
}

async fn reset_login_rate(state: &AppState, username: &str) {
    if let Some(mut redis) = state.db.redis.clone() {
        let key = redis_pool::login_attempts_key(username);
        if let Err(e) = redis_pool::del(&mut redis, &key).await {
            tracing::warn!("Failed to reset login attempts: {e}");
        }
    }
}

/// Deleted accounts and wrong passwords are indistinguishable; only a correct
/// password on an unapproved account reveals that it exists.
fn check_password_login(user: Option<User>, password: &str) -> HubResult<User> {
    let user = user
        .filter(|u| !u.is_deleted())
        .ok_or(HubError::InvalidCredentials)?;

    let Some(hash) = user.password_hash.as_deref() else {
        return Err(HubError::InvalidCredentials);
    };
    let valid = auth::verify_password(password, hash)
        .map_err(|e| HubError::Internal(anyhow::anyhow!("Password verification failed: {e}")))?;
    if !valid {
        return Err(HubError::InvalidCredentials);
    }
    if !user.can_authenticate() {
        return Err(HubError::Forbidden);
    }
    Ok(user)
}

/// POST /api/v1/auth/login - Password login (staff accounts only).
async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> HubResult<Json<AuthResponse>> {
    validate_request(&body)?;
    check_login_rate(&state, &body.username).await?;

    let user = users::find_active_by_username(&state.db.pg, &body.username).await?;
    let user = check_password_login(user, &body.password)?;

    reset_login_rate(&state, &body.username).await;
    tracing::info!(user_id = %user.id, username = %user.username, "User logged in");

    Ok(Json(session_for(user)?))
}

/// POST /api/v1/auth/refresh - Exchange a refresh token for a new pair.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> HubResult<Json<AuthResponse>> {
    let config = config::get();
    let claims = decode_claims(&body.refresh_token, &config.auth.jwt_secret, TokenKind::Refresh)?;

    let user = users::find_by_id(&state.db.pg, claims.sub)
        .await?
        .filter(User::can_authenticate)
        .ok_or(HubError::InvalidToken)?;

    Ok(Json(session_for(user)?))
}

/// POST /api/v1/auth/telegram/register - Sign up with Telegram; the account
/// stays pending until a moderator approves it.
async fn telegram_register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TelegramRegisterRequest>,
) -> HubResult<(StatusCode, Json<RegistrationResponse>)> {
    validate_request(&body)?;
    validate_name(&body.full_name, "Full name")?;
    if !body.consent_personal_data {
        return Err(HubError::validation(
            "Consent to personal data processing is required",
        ));
    }
    verify_telegram(&body.telegram)?;

    let tg = &body.telegram;
    if users::find_by_telegram_id(&state.db.pg, tg.id).await?.is_some() {
        return Err(HubError::AlreadyExists {
            resource: "Telegram account".into(),
        });
    }

    let mut username = username_from_telegram(tg.username.as_deref(), tg.id);
    if users::find_by_username(&state.db.pg, &username).await?.is_some() {
        username = username_from_telegram(None, tg.id);
    }

    let new = users::NewTelegramUser {
        telegram_id: tg.id,
        telegram_username: tg.username.as_deref(),
        username: &username,
        full_name: body.full_name.trim(),
        group_name: body.group_name.as_deref(),
        email: body.email.as_deref(),
        consent_personal_data: body.consent_personal_data,
        consent_photo: body.consent_photo,
    };
    let (user, entry) = users::register_telegram_user(
        &state.db.pg,
        ids::generate_id(),
        ids::generate_id(),
        &new,
    )
    .await?;

    tracing::info!(user_id = %user.id, telegram_id = tg.id, "Registration submitted");
    notify::spawn_department_post(
        &state,
        format!("New registration awaiting moderation: {}", user.full_name),
    );

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            user: user.into(),
            moderation_id: entry.id,
        }),
    ))
}

/// POST /api/v1/auth/telegram/login - Login Widget / Mini App sign-in.
async fn telegram_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TelegramAuthData>,
) -> HubResult<Json<AuthResponse>> {
    verify_telegram(&body)?;

    let user = users::find_by_telegram_id(&state.db.pg, body.id)
        .await?
        .filter(|u| !u.is_deleted())
        .ok_or(HubError::InvalidCredentials)?;
    if !user.can_authenticate() {
        return Err(HubError::Forbidden);
    }

    tracing::info!(user_id = %user.id, "User logged in via Telegram");
    Ok(Json(session_for(user)?))
}

fn generate_session_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(QR_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// POST /api/v1/auth/qr - Start a QR login session.
///
/// The client renders `deep_link` as a QR code; scanning it opens the bot,
/// which confirms the session for the scanning member.
async fn create_qr_session(
    State(state): State<Arc<AppState>>,
) -> HubResult<(StatusCode, Json<QrSessionResponse>)> {
    bot_token()?;
    let config = config::get();
    if config.telegram.bot_username.is_empty() {
        return Err(HubError::Unavailable {
            message: "Telegram bot username is not configured".into(),
        });
    }

    let token = generate_session_token();
    let ttl = i64::try_from(config.auth.qr_session_ttl_secs).unwrap_or(300);
    let expires_at = Utc::now() + Duration::seconds(ttl);
    let session =
        telegram_repo::create_qr_session(&state.db.pg, ids::generate_id(), &token, expires_at)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(QrSessionResponse {
            deep_link: deep_link(
                &config.telegram.bot_username,
                &format!("{QR_START_PREFIX}{}", session.session_token),
            ),
            session_token: session.session_token,
            expires_at: session.expires_at,
        }),
    ))
}

/// GET /api/v1/auth/qr/:token - Poll a QR session.
///
/// Returns `pending` until the bot confirms it, then the session tokens
/// exactly once; later polls see the session as expired.
async fn poll_qr_session(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> HubResult<Json<QrPollResponse>> {
    let expired = || HubError::Expired {
        resource: "QR session".into(),
    };

    let session = telegram_repo::find_qr_session(&state.db.pg, &token)
        .await?
        .ok_or_else(|| HubError::not_found("QR session"))?;

    match session.status {
        QrSessionStatus::Expired => Err(expired()),
        QrSessionStatus::Pending if session.is_expired(Utc::now()) => {
            if let Err(e) = telegram_repo::expire_qr_session(&state.db.pg, &token).await {
                tracing::warn!("Failed to retire stale QR session: {e}");
            }
            Err(expired())
        }
        QrSessionStatus::Pending => Ok(Json(QrPollResponse {
            status: QrSessionStatus::Pending,
            user: None,
            tokens: None,
        })),
        QrSessionStatus::Confirmed => {
            // Consume the session; a concurrent poll that lost the race sees None.
            let consumed = telegram_repo::expire_qr_session(&state.db.pg, &token)
                .await?
                .filter(|s| s.status == QrSessionStatus::Confirmed)
                .ok_or_else(expired)?;
            let user_id = consumed.user_id.ok_or_else(expired)?;

            let user = users::find_by_id(&state.db.pg, user_id)
                .await?
                .filter(User::can_authenticate)
                .ok_or(HubError::Forbidden)?;

            tracing::info!(user_id = %user.id, "User logged in via QR session");
            let session = session_for(user)?;
            Ok(Json(QrPollResponse {
                status: QrSessionStatus::Confirmed,
                user: Some(session.user),
                tokens: Some(session.tokens),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use crate::test_support;

    fn staff(password: &str) -> User {
        User {
            id: Uuid::now_v7(),
            telegram_id: None,
            telegram_username: None,
            username: "admin".into(),
            full_name: "Department Head".into(),
            email: None,
            group_name: None,
            password_hash: Some(auth::hash_password(password).unwrap()),
            role: prhub_common::models::Role::Vp4pr,
            points: 0,
            level: 1,
            registration_status: prhub_common::models::RegistrationStatus::Approved,
            consent_personal_data: true,
            consent_photo: false,
            consent_given_at: None,
            last_activity_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn deleted_accounts_look_like_bad_credentials() {
        let mut user = staff("correct-horse");
        assert!(check_password_login(Some(user.clone()), "correct-horse").is_ok());

        user.deleted_at = Some(Utc::now());
        assert!(matches!(
            check_password_login(Some(user), "correct-horse"),
            Err(HubError::InvalidCredentials)
        ));
        assert!(matches!(
            check_password_login(None, "correct-horse"),
            Err(HubError::InvalidCredentials)
        ));
    }

    #[test]
    fn unapproved_account_with_right_password_is_forbidden() {
        let mut user = staff("correct-horse");
        user.registration_status = prhub_common::models::RegistrationStatus::Pending;
        assert!(matches!(
            check_password_login(Some(user.clone()), "wrong"),
            Err(HubError::InvalidCredentials)
        ));
        assert!(matches!(
            check_password_login(Some(user), "correct-horse"),
            Err(HubError::Forbidden)
        ));
    }

    #[test]
    fn session_tokens_are_random_alphanumerics() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), QR_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn pending_poll_omits_tokens() {
        let json = serde_json::to_value(QrPollResponse {
            status: QrSessionStatus::Pending,
            user: None,
            tokens: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "status": "pending" }));
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let cfg = test_support::config();
        let pair = auth::generate_token_pair(
            Uuid::now_v7(),
            "anna",
            &cfg.auth.jwt_secret,
            60,
            120,
        )
        .unwrap();

        let body = serde_json::json!({ "refresh_token": pair.access_token }).to_string();
        let response = test_support::app()
            .oneshot(
                Request::post("/api/v1/auth/refresh")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn registration_requires_consent() {
        test_support::config();
        let body = serde_json::json!({
            "telegram": { "id": 1, "auth_date": 0, "hash": "00" },
            "full_name": "Anna Petrova",
            "consent_personal_data": false
        })
        .to_string();
        let response = test_support::app()
            .oneshot(
                Request::post("/api/v1/auth/telegram/register")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forged_telegram_login_is_rejected() {
        test_support::config();
        let body = serde_json::json!({
            "id": 42,
            "first_name": "Anna",
            "auth_date": Utc::now().timestamp(),
            "hash": "deadbeef"
        })
        .to_string();
        let response = test_support::app()
            .oneshot(
                Request::post("/api/v1/auth/telegram/login")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
