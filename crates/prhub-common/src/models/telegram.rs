//! Bot-linked records: task chat topics and QR login sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::text_enum;

/// A forum topic (or plain chat) bound to a task.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TelegramChat {
    pub id: Uuid,
    pub chat_id: i64,
    pub message_thread_id: Option<i64>,
    pub task_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

text_enum! {
    pub enum QrSessionStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Expired => "expired",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QrSession {
    pub id: Uuid,
    pub session_token: String,
    pub status: QrSessionStatus,
    pub user_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl QrSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == QrSessionStatus::Expired || now >= self.expires_at
    }
}

/// Deep-link payload prefix for QR sessions.
pub const QR_START_PREFIX: &str = "qr_";

/// Fields posted by the Telegram Login Widget / Mini App.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramAuthData {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub photo_url: Option<String>,
    pub auth_date: i64,
    pub hash: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TelegramRegisterRequest {
    pub telegram: TelegramAuthData,

    #[validate(length(min = 2, max = 128, message = "Full name must be 2-128 characters"))]
    pub full_name: String,

    #[validate(length(max = 32))]
    pub group_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub consent_personal_data: bool,

    #[serde(default)]
    pub consent_photo: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn qr_expiry() {
        let now = Utc::now();
        let mut s = QrSession {
            id: Uuid::nil(),
            session_token: "t".into(),
            status: QrSessionStatus::Pending,
            user_id: None,
            expires_at: now + Duration::seconds(60),
            created_at: now,
            confirmed_at: None,
        };
        assert!(!s.is_expired(now));
        assert!(s.is_expired(now + Duration::seconds(60)));

        s.status = QrSessionStatus::Expired;
        assert!(s.is_expired(now));
    }
}
