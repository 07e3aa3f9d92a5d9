//! User model: department members, their role and progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;
use validator::Validate;

use super::text_enum;

text_enum! {
    /// Department role. Coarse roles follow points; special roles are assigned.
    pub enum Role {
        Novice => "novice",
        Member => "member",
        Active => "active",
        CoordinatorSmm => "coordinator_smm",
        CoordinatorDesign => "coordinator_design",
        CoordinatorChannel => "coordinator_channel",
        CoordinatorPrfr => "coordinator_prfr",
        Vp4pr => "vp4pr",
    }
}

impl Role {
    /// Coordinators and VP4PR keep their role regardless of points.
    pub fn is_special(&self) -> bool {
        !matches!(self, Role::Novice | Role::Member | Role::Active)
    }
}

text_enum! {
    /// Where a member is in the registration moderation workflow.
    pub enum RegistrationStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

/// A PR Hub user account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub telegram_id: Option<i64>,
    pub telegram_username: Option<String>,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub email: Option<String>,
    pub group_name: Option<String>,
    /// Argon2id hash; Telegram-only accounts have none
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub points: i32,
    pub level: i32,
    pub registration_status: RegistrationStatus,
    pub consent_personal_data: bool,
    pub consent_photo: bool,
    pub consent_given_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Only approved, non-deleted accounts may sign in.
    pub fn can_authenticate(&self) -> bool {
        !self.is_deleted() && self.registration_status == RegistrationStatus::Approved
    }
}

/// Safe user representation for API responses (no sensitive fields).
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub telegram_username: Option<String>,
    pub group_name: Option<String>,
    pub role: Role,
    pub points: i32,
    pub level: i32,
    pub registration_status: RegistrationStatus,
    pub consent_personal_data: bool,
    pub consent_photo: bool,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            deleted: u.is_deleted(),
            id: u.id,
            username: u.username,
            full_name: u.full_name,
            telegram_username: u.telegram_username,
            group_name: u.group_name,
            role: u.role,
            points: u.points,
            level: u.level,
            registration_status: u.registration_status,
            consent_personal_data: u.consent_personal_data,
            consent_photo: u.consent_photo,
            last_activity_at: u.last_activity_at,
            created_at: u.created_at,
        }
    }
}

/// Leaderboard row.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub full_name: String,
    pub role: Role,
    pub points: i32,
    pub level: i32,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Self-service profile update.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 128, message = "Full name must be 2-128 characters"))]
    pub full_name: Option<String>,

    #[validate(length(max = 32))]
    pub group_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub consent_personal_data: Option<bool>,
    pub consent_photo: Option<bool>,
}

/// Query filters for the member directory.
#[derive(Debug, Deserialize, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub registration_status: Option<RegistrationStatus>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AwardPointsRequest {
    #[validate(range(min = -1000, max = 1000, message = "Delta must be between -1000 and 1000"))]
    pub delta: i32,

    #[validate(length(min = 1, max = 255, message = "Reason must be 1-255 characters"))]
    pub reason: String,
}

/// Username rules shared by admin creation and Telegram registration.
pub static USERNAME_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[a-zA-Z0-9_-]{3,32}$").expect("valid username regex"));

/// Derive a username from a Telegram handle or id.
pub fn username_from_telegram(handle: Option<&str>, telegram_id: i64) -> String {
    match handle {
        Some(h) if USERNAME_REGEX.is_match(h) => h.to_string(),
        _ => format!("tg_{telegram_id}"),
    }
}
