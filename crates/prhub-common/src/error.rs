//! Error type shared by every PR Hub crate.
//!
//! Each variant knows its HTTP status and a stable machine-readable code, so
//! handlers can return `HubResult<T>` and let axum render the failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    // === Auth errors ===
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    // === Resource errors ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{resource} already exists")]
    AlreadyExists { resource: String },

    #[error("{resource} has expired")]
    Expired { resource: String },

    // === Workflow errors ===
    #[error("Cannot move {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("Not available: {message}")]
    Unavailable { message: String },

    // === Validation errors ===
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // === Permission errors ===
    #[error("Missing permission: {permission}")]
    MissingPermission { permission: String },

    #[error("Forbidden")]
    Forbidden,

    // === Rate limiting ===
    #[error("Rate limited. Retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    // === Infrastructure errors ===
    #[error("{service} request failed: {message}")]
    External { service: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

impl HubError {
    /// Shorthand for the common `NotFound` case.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } => StatusCode::CONFLICT,
            Self::Expired { .. } => StatusCode::GONE,
            Self::InvalidTransition { .. } | Self::Unavailable { .. } => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::MissingPermission { .. } | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::External { .. } => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Redis(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Expired { .. } => "EXPIRED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Unavailable { .. } => "UNAVAILABLE",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::MissingPermission { .. } => "MISSING_PERMISSION",
            Self::Forbidden => "FORBIDDEN",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::External { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "CACHE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl HubError {
    /// Text shown to the client. Infrastructure failures are logged here and
    /// replaced with a generic message.
    fn public_message(&self) -> String {
        match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database failure");
                GENERIC_MESSAGE.into()
            }
            Self::Redis(e) => {
                tracing::error!(error = %e, "Redis failure");
                GENERIC_MESSAGE.into()
            }
            Self::Internal(e) => {
                tracing::error!("Internal failure: {e:#}");
                GENERIC_MESSAGE.into()
            }
            Self::External { service, message } => {
                tracing::warn!(service = %service, "Upstream failure: {message}");
                format!("{service} is unavailable right now")
            }
            other => other.to_string(),
        }
    }
}

const GENERIC_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.error_code().to_string(),
            message: self.public_message(),
            retry_after_ms: match self {
                Self::RateLimited { retry_after_ms } => Some(retry_after_ms),
                _ => None,
            },
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using HubError.
pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_conflict() {
        let err = HubError::InvalidTransition {
            entity: "task".into(),
            from: "completed".into(),
            to: "open".into(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert_eq!(err.to_string(), "Cannot move task from 'completed' to 'open'");

        let err = HubError::Unavailable {
            message: "only 1 left".into(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_and_permission_errors() {
        assert_eq!(HubError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(HubError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            HubError::MissingPermission {
                permission: "MODERATE".into()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            HubError::Expired {
                resource: "QR session".into()
            }
            .status_code(),
            StatusCode::GONE
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = HubError::Internal(anyhow::anyhow!("secret connection string")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_failures_name_the_service_only() {
        let err = HubError::External {
            service: "telegram".into(),
            message: "401 Unauthorized: bot token revoked".into(),
        };
        assert_eq!(err.public_message(), "telegram is unavailable right now");
        assert_eq!(
            HubError::not_found("Task").public_message(),
            "Task not found"
        );
    }
}
