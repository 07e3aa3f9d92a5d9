//! Generic approve/reject queue used for registrations and file uploads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::invalid;
use super::text_enum;
use crate::error::HubError;

text_enum! {
    pub enum ModerationItemType {
        Registration => "registration",
        FileUpload => "file_upload",
    }
}

text_enum! {
    pub enum ModerationStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl ModerationStatus {
    /// Only pending entries can be decided, and only once.
    pub fn decide(&self, next: ModerationStatus) -> Result<ModerationStatus, HubError> {
        match (self, next) {
            (Self::Pending, Self::Approved | Self::Rejected) => Ok(next),
            _ => Err(invalid("moderation entry", self.as_str(), next.as_str())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModerationEntry {
    pub id: Uuid,
    pub item_type: ModerationItemType,
    /// User id for registrations, upload id for files
    pub item_id: Uuid,
    pub submitted_by: Uuid,
    pub status: ModerationStatus,
    pub reviewer_id: Option<Uuid>,
    pub comment: Option<String>,
    /// Snapshot shown to moderators (name, group, filename, ...)
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ModerationFilter {
    pub status: Option<ModerationStatus>,
    pub item_type: Option<ModerationItemType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_are_final() {
        use ModerationStatus::*;
        assert_eq!(Pending.decide(Approved).unwrap(), Approved);
        assert_eq!(Pending.decide(Rejected).unwrap(), Rejected);
        assert!(Approved.decide(Rejected).is_err());
        assert!(Rejected.decide(Approved).is_err());
        assert!(Pending.decide(Pending).is_err());
    }
}
