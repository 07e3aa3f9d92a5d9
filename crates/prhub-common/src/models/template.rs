//! Reusable task blueprints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

use super::task::{TaskPriority, TaskType};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    /// Stage names in pipeline order
    pub stages: Json<Vec<String>>,
    pub default_duration_days: i32,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTemplateRequest {
    #[validate(length(min = 1, max = 100, message = "Template name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 stages"))]
    pub stages: Vec<String>,
    #[validate(range(min = 1, max = 365, message = "Duration must be 1-365 days"))]
    pub default_duration_days: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTemplateRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    #[validate(length(max = 20))]
    pub stages: Option<Vec<String>>,
    #[validate(range(min = 1, max = 365))]
    pub default_duration_days: Option<i32>,
    pub is_active: Option<bool>,
}

/// Overrides when instantiating a template.
#[derive(Debug, Deserialize, Validate, Default)]
pub struct InstantiateTemplateRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 10_000))]
    pub description: Option<String>,
    #[serde(default)]
    pub publish: bool,
}
