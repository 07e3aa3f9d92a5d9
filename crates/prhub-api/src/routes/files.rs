//! File upload routes: multipart upload to object storage, pending moderation.
//!
//! - `POST /api/v1/files/upload` uploads a file (multipart/form-data)
//! - `GET /api/v1/files` lists own uploads (moderators see all)
//! - `GET /api/v1/files/:id` returns metadata and a download link
//! - `DELETE /api/v1/files/:id` withdraws a pending upload

use axum::{
    Json, Router,
    extract::{Extension, Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use prhub_common::{
    config,
    error::{HubError, HubResult},
    ids,
    models::{FileFilter, FileUpload, FileUploadResponse, ModerationItemType, UploadStatus},
    pagination::{Page, PageParams},
    permissions::Permissions,
    validation::sanitize_filename,
};
use prhub_db::{
    repository::{files, gallery, moderation, tasks},
    storage::{self, PRESIGNED_URL_TTL_SECS},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, middleware::AuthContext, routes::page_window};

const MAX_TITLE_LEN: usize = 200;

/// Media and document types accepted for upload. Everything else, notably
/// executables and HTML, is refused.
fn is_allowed_content_type(ct: &str) -> bool {
    matches!(
        ct,
        // Images
        | "image/jpeg" | "image/png" | "image/gif" | "image/webp"
        | "image/svg+xml" | "image/heic" | "image/heif" | "image/tiff"
        // Video
        | "video/mp4" | "video/webm" | "video/quicktime" | "video/x-msvideo"
        // Audio
        | "audio/mpeg" | "audio/ogg" | "audio/wav" | "audio/aac" | "audio/mp4"
        // Documents
        | "application/pdf" | "text/plain"
        | "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        | "application/zip"
    )
}

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/files", get(list_files))
        .route("/files/upload", post(upload_file))
        .route("/files/{file_id}", get(get_file).delete(delete_file))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth_middleware,
        ))
}

fn multipart_error(e: impl std::fmt::Display) -> HubError {
    HubError::validation(format!("Multipart error: {e}"))
}

fn storage_error(e: anyhow::Error) -> HubError {
    HubError::External {
        service: "storage".into(),
        message: format!("{e:#}"),
    }
}

/// Download link for an upload; rejected uploads have no object behind them.
async fn with_url(state: &AppState, file: FileUpload) -> FileUploadResponse {
    let url = if file.status == UploadStatus::Rejected {
        None
    } else {
        match state
            .storage
            .presigned_get_url(&file.storage_key, PRESIGNED_URL_TTL_SECS)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(file_id = %file.id, "Presigning failed: {e:#}");
                None
            }
        }
    };
    FileUploadResponse { file, url }
}

// ============================================================
// POST /files/upload
// ============================================================

/// Upload a file via multipart/form-data.
///
/// Form fields:
/// - `file` - the binary file (required)
/// - `task_id` - task the material belongs to (optional)
/// - `title` - caption for the gallery (optional)
/// - `publish_to_gallery` - "true" to publish once approved (optional)
async fn upload_file(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> HubResult<(StatusCode, Json<FileUploadResponse>)> {
    auth.require(Permissions::UPLOAD_FILES)?;

    let max_size = config::get().limits.max_file_size_bytes;
    let mut file_data: Option<Vec<u8>> = None;
    let mut filename = String::from("upload");
    let mut content_type = String::from("application/octet-stream");
    let mut task_id: Option<Uuid> = None;
    let mut title: Option<String> = None;
    let mut publish_to_gallery = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                if let Some(name) = field.file_name() {
                    filename = name.to_string();
                }
                if let Some(ct) = field.content_type() {
                    content_type = ct.to_ascii_lowercase();
                }
                if !is_allowed_content_type(&content_type) {
                    return Err(HubError::validation(format!(
                        "File type '{content_type}' is not allowed"
                    )));
                }

                let bytes = field.bytes().await.map_err(multipart_error)?;
                if bytes.len() as u64 > max_size {
                    return Err(HubError::validation(format!(
                        "File too large: {} bytes (max {max_size} bytes)",
                        bytes.len()
                    )));
                }
                file_data = Some(bytes.to_vec());
            }
            Some("task_id") => {
                let val = field.text().await.map_err(multipart_error)?;
                let val = val.trim();
                if !val.is_empty() {
                    task_id = Some(
                        Uuid::parse_str(val)
                            .map_err(|_| HubError::validation("task_id must be a UUID"))?,
                    );
                }
            }
            Some("title") => {
                let val = field.text().await.map_err(multipart_error)?;
                let val = val.trim();
                if val.chars().count() > MAX_TITLE_LEN {
                    return Err(HubError::validation(format!(
                        "Title must be at most {MAX_TITLE_LEN} characters"
                    )));
                }
                title = Some(val.to_string()).filter(|t| !t.is_empty());
            }
            Some("publish_to_gallery") => {
                let val = field.text().await.map_err(multipart_error)?;
                publish_to_gallery = matches!(val.trim(), "true" | "1" | "on");
            }
            _ => {}
        }
    }

    let data = file_data.ok_or_else(|| HubError::validation("No file field in request"))?;
    if data.is_empty() {
        return Err(HubError::validation("File is empty"));
    }
    if let Some(task_id) = task_id {
        tasks::find_by_id(&state.db.pg, task_id)
            .await?
            .ok_or_else(|| HubError::not_found("Task"))?;
    }

    let size = data.len() as i64;
    let safe_filename = sanitize_filename(&filename);
    let sha256 = hex::encode(Sha256::digest(&data));

    let file_id = ids::generate_id();
    let ext = storage::extension_for(&safe_filename, &content_type);
    let storage_key = storage::temp_key(auth.user_id, file_id, &ext);

    state
        .storage
        .put_object(&storage_key, data, &content_type)
        .await
        .map_err(storage_error)?;

    let new = files::NewFileUpload {
        id: file_id,
        uploader_id: auth.user_id,
        task_id,
        filename: &safe_filename,
        content_type: &content_type,
        size,
        storage_key: &storage_key,
        title: title.as_deref(),
        publish_to_gallery,
        sha256: &sha256,
    };
    let (file, entry) =
        match files::create_with_moderation(&state.db.pg, &new, ids::generate_id()).await {
            Ok(created) => created,
            Err(e) => {
                if let Err(cleanup) = state.storage.delete_object(&storage_key).await {
                    tracing::warn!(key = %storage_key, "Failed to remove orphaned upload: {cleanup:#}");
                }
                return Err(e);
            }
        };

    tracing::info!(
        file_id = %file.id,
        moderation_id = %entry.id,
        uploader = %auth.user_id,
        size,
        content_type = %file.content_type,
        "File uploaded"
    );

    Ok((StatusCode::CREATED, Json(with_url(&state, file).await)))
}

// ============================================================
// Queries
// ============================================================

/// GET /api/v1/files?status=&task_id=
async fn list_files(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
    Query(filter): Query<FileFilter>,
) -> HubResult<Json<Page<FileUploadResponse>>> {
    let scope = (!auth.has(Permissions::MODERATE)).then_some(auth.user_id);

    let (offset, limit) = page_window(&page);
    let (items, total) = files::list_uploads(&state.db.pg, &filter, scope, offset, limit).await?;

    let mut responses = Vec::with_capacity(items.len());
    for file in items {
        responses.push(with_url(&state, file).await);
    }
    Ok(Json(Page::new(responses, total, offset, limit)))
}

/// GET /api/v1/files/:file_id - Approved files are visible to every member.
async fn get_file(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<Uuid>,
) -> HubResult<Json<FileUploadResponse>> {
    let file = files::find_by_id(&state.db.pg, file_id)
        .await?
        .filter(|f| {
            f.uploader_id == auth.user_id
                || f.status == UploadStatus::Approved
                || auth.has(Permissions::MODERATE)
        })
        .ok_or_else(|| HubError::not_found("File"))?;

    Ok(Json(with_url(&state, file).await))
}

/// DELETE /api/v1/files/:file_id
async fn delete_file(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<Uuid>,
) -> HubResult<StatusCode> {
    let file = files::find_by_id(&state.db.pg, file_id)
        .await?
        .ok_or_else(|| HubError::not_found("File"))?;

    let is_owner = file.uploader_id == auth.user_id;
    if !auth.has(Permissions::MODERATE) {
        if !is_owner {
            return Err(HubError::not_found("File"));
        }
        if file.status != UploadStatus::Pending {
            return Err(HubError::validation(
                "Only pending uploads can be withdrawn",
            ));
        }
    }

    moderation::delete_pending_for_item(&state.db.pg, ModerationItemType::FileUpload, file.id)
        .await?;
    if !files::delete_upload(&state.db.pg, file.id).await? {
        return Err(HubError::not_found("File"));
    }

    let still_published = gallery::references_key(&state.db.pg, &file.storage_key)
        .await
        .unwrap_or(true);
    if file.status != UploadStatus::Rejected && !still_published {
        if let Err(e) = state.storage.delete_object(&file.storage_key).await {
            tracing::warn!(file_id = %file.id, "Failed to delete stored object: {e:#}");
        }
    }

    tracing::info!(file_id = %file.id, by = %auth.user_id, "File deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_types() {
        assert!(is_allowed_content_type("image/jpeg"));
        assert!(is_allowed_content_type("video/quicktime"));
        assert!(is_allowed_content_type("application/pdf"));
        assert!(!is_allowed_content_type("application/x-msdownload"));
        assert!(!is_allowed_content_type("text/html"));
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let digest = hex::encode(Sha256::digest(b"abc"));
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
