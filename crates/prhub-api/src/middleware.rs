//! Middleware: authentication extraction and security headers.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use prhub_common::auth::{TokenKind, decode_claims};
use prhub_common::error::{HubError, HubResult};
use prhub_common::models::Role;
use prhub_common::permissions::Permissions;
use prhub_db::repository::users;
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;

/// `last_activity_at` is refreshed at most this often per member.
const ACTIVITY_RESOLUTION_SECS: i64 = 60;

/// Authentication context extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub permissions: Permissions,
}

impl AuthContext {
    pub fn has(&self, required: Permissions) -> bool {
        self.permissions.has(required)
    }

    pub fn require(&self, required: Permissions) -> HubResult<()> {
        self.permissions.require(required)
    }

    /// Allowed when the caller is `owner` or holds `override_with`.
    pub fn require_self_or(&self, owner: Uuid, override_with: Permissions) -> HubResult<()> {
        if self.user_id == owner {
            Ok(())
        } else {
            self.require(override_with)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validate the access token and load the member it belongs to.
///
/// Role and permissions always come from the database, so role changes and
/// deletions take effect on the next request.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, HubError> {
    let token = bearer_token(request.headers()).ok_or(HubError::Unauthorized)?;

    let config = prhub_common::config::get();
    let claims = decode_claims(token, &config.auth.jwt_secret, TokenKind::Access)?;

    let user = users::find_by_id(&state.db.pg, claims.sub)
        .await?
        .ok_or(HubError::InvalidToken)?;

    if !user.can_authenticate() {
        return Err(HubError::Unauthorized);
    }

    let now = Utc::now();
    let stale = user
        .last_activity_at
        .is_none_or(|at| now - at > Duration::seconds(ACTIVITY_RESOLUTION_SECS));
    if stale {
        if let Err(e) = users::touch_activity(&state.db.pg, user.id).await {
            tracing::warn!(user_id = %user.id, "Failed to record activity: {e}");
        }
    }

    request.extensions_mut().insert(AuthContext {
        user_id: user.id,
        username: user.username,
        role: user.role,
        permissions: Permissions::for_role(user.role),
    });

    Ok(next.run(request).await)
}

// ── Security headers ──────────────────────────────────────────────────────────

/// Add security headers to every HTTP response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let h = response.headers_mut();

    macro_rules! set {
        ($name:expr, $val:expr) => {
            if let Ok(v) = $val.parse::<axum::http::HeaderValue>() {
                h.insert($name, v);
            }
        };
    }

    set!(
        axum::http::header::HeaderName::from_static("x-content-type-options"),
        "nosniff"
    );
    set!(
        axum::http::header::HeaderName::from_static("x-frame-options"),
        "DENY"
    );
    set!(
        axum::http::header::HeaderName::from_static("referrer-policy"),
        "strict-origin-when-cross-origin"
    );
    set!(
        axum::http::header::HeaderName::from_static("permissions-policy"),
        "camera=(), microphone=(), geolocation=(), payment=()"
    );
    set!(
        axum::http::header::HeaderName::from_static("strict-transport-security"),
        "max-age=63072000; includeSubDomains"
    );
    set!(
        axum::http::header::HeaderName::from_static("content-security-policy"),
        "default-src 'none'; frame-ancestors 'none'"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer   ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn self_or_permission() {
        let me = Uuid::now_v7();
        let ctx = AuthContext {
            user_id: me,
            username: "anna".into(),
            role: Role::Member,
            permissions: Permissions::for_role(Role::Member),
        };
        assert!(ctx.require_self_or(me, Permissions::MANAGE_TASKS).is_ok());
        assert!(ctx.require_self_or(Uuid::nil(), Permissions::MANAGE_TASKS).is_err());

        let coordinator = AuthContext {
            role: Role::CoordinatorSmm,
            permissions: Permissions::for_role(Role::CoordinatorSmm),
            ..ctx
        };
        assert!(coordinator.require_self_or(Uuid::nil(), Permissions::MANAGE_TASKS).is_ok());
    }
}
