//! Permission system: each role maps to a fixed set of capability bits.
//!
//! Handlers never compare role names directly; they ask whether the caller's
//! role grants a capability, so adding a role only touches [`Permissions::for_role`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::HubError;
use crate::models::user::Role;

bitflags! {
    /// Department-wide capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permissions: i64 {
        // === Every approved member ===
        /// Browse tasks, templates, equipment and the gallery
        const VIEW_TASKS        = 1 << 0;
        /// Self-assign to open tasks
        const TAKE_TASKS        = 1 << 1;
        /// Book equipment
        const REQUEST_EQUIPMENT = 1 << 2;
        /// Upload files for moderation
        const UPLOAD_FILES      = 1 << 3;

        // === Coordinators ===
        /// Create tasks (directly or from templates)
        const CREATE_TASKS      = 1 << 8;
        /// Edit, delete, assign and move any task
        const MANAGE_TASKS      = 1 << 9;
        /// Approve or reject registrations and uploads
        const MODERATE          = 1 << 10;
        /// Manage inventory and decide on bookings
        const MANAGE_EQUIPMENT  = 1 << 11;
        /// Curate the public gallery
        const MANAGE_GALLERY    = 1 << 12;
        /// Maintain task templates
        const MANAGE_TEMPLATES  = 1 << 13;
        /// Rate assignments and grant points
        const AWARD_POINTS      = 1 << 14;
        /// See the full member directory
        const VIEW_USERS        = 1 << 15;

        // === VP4PR ===
        /// Change roles, deactivate accounts
        const MANAGE_USERS      = 1 << 20;
        /// Send notifications to everyone
        const BROADCAST         = 1 << 21;
    }
}

impl Permissions {
    /// Baseline for any approved member.
    pub fn member() -> Self {
        Self::VIEW_TASKS | Self::TAKE_TASKS | Self::REQUEST_EQUIPMENT | Self::UPLOAD_FILES
    }

    /// Everything a coordinator can do.
    pub fn coordinator() -> Self {
        Self::member()
            | Self::CREATE_TASKS
            | Self::MANAGE_TASKS
            | Self::MODERATE
            | Self::MANAGE_EQUIPMENT
            | Self::MANAGE_GALLERY
            | Self::MANAGE_TEMPLATES
            | Self::AWARD_POINTS
            | Self::VIEW_USERS
    }

    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Novice | Role::Member | Role::Active => Self::member(),
            Role::CoordinatorSmm
            | Role::CoordinatorDesign
            | Role::CoordinatorChannel
            | Role::CoordinatorPrfr => Self::coordinator(),
            Role::Vp4pr => Self::all(),
        }
    }

    /// Check if a user with these permissions can perform an action.
    pub fn has(&self, required: Permissions) -> bool {
        self.contains(required)
    }

    /// Like [`has`](Self::has) but produces the API error on failure.
    pub fn require(&self, required: Permissions) -> Result<(), HubError> {
        if self.has(required) {
            Ok(())
        } else {
            Err(HubError::MissingPermission {
                permission: permission_name(required),
            })
        }
    }
}

fn permission_name(p: Permissions) -> String {
    p.iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(" | ")
}
