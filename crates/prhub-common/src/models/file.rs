//! Uploaded media and the curated gallery built from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::text_enum;

text_enum! {
    /// Object-storage prefix: uploads wait in `temp` until approved.
    pub enum StorageFolder {
        Temp => "temp",
        Permanent => "permanent",
    }
}

text_enum! {
    pub enum UploadStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    pub enum GalleryCategory {
        Photo => "photo",
        Video => "video",
        Design => "design",
        Other => "other",
    }
}

impl GalleryCategory {
    /// Best guess from a MIME type.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            Self::Photo
        } else if content_type.starts_with("video/") {
            Self::Video
        } else if content_type == "application/pdf" {
            Self::Design
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileUpload {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub task_id: Option<Uuid>,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub folder: StorageFolder,
    pub status: UploadStatus,
    pub title: Option<String>,
    pub publish_to_gallery: bool,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upload metadata plus a short-lived download link.
#[derive(Debug, Serialize)]
pub struct FileUploadResponse {
    #[serde(flatten)]
    pub file: FileUpload,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FileFilter {
    pub status: Option<UploadStatus>,
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GalleryItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: GalleryCategory,
    pub file_upload_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub storage_key: Option<String>,
    pub external_url: Option<String>,
    pub task_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GalleryItemResponse {
    #[serde(flatten)]
    pub item: GalleryItem,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGalleryItemRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub category: Option<GalleryCategory>,
    /// An approved upload to publish
    pub file_upload_id: Option<Uuid>,
    /// Or a link to media hosted elsewhere
    #[validate(url(message = "Invalid URL"))]
    pub external_url: Option<String>,
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGalleryItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub category: Option<GalleryCategory>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GalleryFilter {
    pub category: Option<GalleryCategory>,
    pub featured: Option<bool>,
    pub task_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_guess() {
        assert_eq!(GalleryCategory::from_content_type("image/png"), GalleryCategory::Photo);
        assert_eq!(GalleryCategory::from_content_type("video/mp4"), GalleryCategory::Video);
        assert_eq!(GalleryCategory::from_content_type("application/pdf"), GalleryCategory::Design);
        assert_eq!(GalleryCategory::from_content_type("audio/ogg"), GalleryCategory::Other);
    }
}
