//! Equipment inventory and date-ranged bookings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::task::invalid;
use super::text_enum;
use crate::error::HubError;

text_enum! {
    pub enum EquipmentCategory {
        Camera => "camera",
        Lens => "lens",
        Lighting => "lighting",
        Audio => "audio",
        Tripod => "tripod",
        Storage => "storage",
        Other => "other",
    }
}

text_enum! {
    pub enum EquipmentStatus {
        Available => "available",
        Maintenance => "maintenance",
        Retired => "retired",
    }
}

text_enum! {
    /// Booking lifecycle: pending → approved → active (issued) → returned.
    pub enum RequestStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Active => "active",
        Returned => "returned",
        Cancelled => "cancelled",
    }
}

impl RequestStatus {
    /// Bookings that hold stock for their date range.
    pub fn holds_stock(&self) -> bool {
        matches!(self, Self::Approved | Self::Active)
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Cancelled)
                | (Self::Approved, Self::Active)
                | (Self::Approved, Self::Cancelled)
                | (Self::Active, Self::Returned)
        )
    }

    pub fn transition(&self, next: RequestStatus) -> Result<RequestStatus, HubError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(invalid("equipment request", self.as_str(), next.as_str()))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Equipment {
    pub id: Uuid,
    pub name: String,
    pub category: EquipmentCategory,
    pub quantity: i32,
    pub description: Option<String>,
    pub status: EquipmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EquipmentRequest {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub task_id: Option<Uuid>,
    pub quantity: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub purpose: Option<String>,
    pub status: RequestStatus,
    pub reviewed_by: Option<Uuid>,
    pub review_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inclusive date ranges overlap when each starts no later than the other ends.
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Units left once overlapping bookings are subtracted.
pub fn available_quantity(total: i32, booked: i64) -> i64 {
    (i64::from(total) - booked).max(0)
}

/// Reject a booking that would oversubscribe the item.
pub fn check_availability(total: i32, booked: i64, requested: i32) -> Result<(), HubError> {
    let available = available_quantity(total, booked);
    if i64::from(requested) > available {
        return Err(HubError::Unavailable {
            message: format!("requested {requested}, only {available} of {total} free for these dates"),
        });
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub equipment_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total: i32,
    pub booked: i64,
    pub available: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEquipmentRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    pub category: EquipmentCategory,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be positive"))]
    pub quantity: i32,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEquipmentRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub category: Option<EquipmentCategory>,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be positive"))]
    pub quantity: Option<i32>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub status: Option<EquipmentStatus>,
}

#[derive(Debug, Deserialize, Default)]
pub struct EquipmentFilter {
    pub category: Option<EquipmentCategory>,
    pub status: Option<EquipmentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub equipment_id: Uuid,
    pub task_id: Option<Uuid>,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(length(max = 1000))]
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct BookingFilter {
    pub status: Option<RequestStatus>,
    pub equipment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct ReviewRequest {
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}
