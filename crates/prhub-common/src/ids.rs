//! Row identifiers.
//!
//! Every table keys on a UUID v7 generated by the application, so ids sort by
//! creation time and can be assigned before the insert.

use uuid::Uuid;

pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}
