//! Points, levels and the points-derived roles.
//!
//! Points only ever change through [`apply_points`]. The repository runs it
//! inside the transaction that locks the user row, so level and role always
//! agree with the stored points.

use crate::models::task::TaskPriority;
use crate::models::user::Role;

/// Minimum points for levels 1..=10.
pub const LEVEL_THRESHOLDS: [i32; 10] = [0, 50, 150, 300, 500, 800, 1200, 1700, 2300, 3000];

/// Points at which a novice becomes a member.
pub const MEMBER_THRESHOLD: i32 = 100;
/// Points at which a member becomes active.
pub const ACTIVE_THRESHOLD: i32 = 500;

/// Result of a points change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub points: i32,
    pub level: i32,
    pub role: Role,
}

pub fn level_for_points(points: i32) -> i32 {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|&min| points >= min)
        .map(|idx| idx as i32 + 1)
        .unwrap_or(1)
}

pub fn role_for_points(points: i32) -> Role {
    if points < MEMBER_THRESHOLD {
        Role::Novice
    } else if points < ACTIVE_THRESHOLD {
        Role::Member
    } else {
        Role::Active
    }
}

/// Apply a points delta and, optionally, a role assignment.
///
/// Special roles (coordinators, VP4PR) are sticky: points never demote them.
/// Assigning a coarse role unpins the user, who then gets the role their
/// points earn.
pub fn apply_points(
    current_points: i32,
    current_role: Role,
    delta: i32,
    assigned_role: Option<Role>,
) -> Progress {
    let points = current_points.saturating_add(delta).max(0);
    let role = match assigned_role {
        Some(role) if role.is_special() => role,
        Some(_) => role_for_points(points),
        None if current_role.is_special() => current_role,
        None => role_for_points(points),
    };

    Progress {
        points,
        level: level_for_points(points),
        role,
    }
}

/// Base reward for completing a task of the given priority.
pub fn base_points(priority: TaskPriority) -> i32 {
    match priority {
        TaskPriority::Low => 10,
        TaskPriority::Medium => 20,
        TaskPriority::High => 35,
        TaskPriority::Critical => 50,
    }
}

/// Points for a rated assignment; a 5-star rating earns the full base.
pub fn points_for_rating(priority: TaskPriority, rating: i16) -> i32 {
    let rating = i32::from(rating.clamp(0, 5));
    base_points(priority) * rating / 5
}
