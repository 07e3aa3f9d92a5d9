//! Gallery routes: the department's curated portfolio.

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::get,
};
use prhub_common::{
    error::{HubError, HubResult},
    ids,
    models::{
        CreateGalleryItemRequest, GalleryCategory, GalleryFilter, GalleryItem,
        GalleryItemResponse, StorageFolder, UpdateGalleryItemRequest, UploadStatus,
    },
    pagination::{Page, PageParams},
    permissions::Permissions,
    validation::{validate_name, validate_request},
};
use prhub_db::{
    repository::{files, gallery, tasks},
    storage::PRESIGNED_URL_TTL_SECS,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{AppState, middleware::AuthContext, routes::page_window};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/gallery", get(list_items).post(create_item))
        .route(
            "/gallery/{item_id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth_middleware,
        ))
}

/// Stored media is served from the public base when configured, otherwise
/// through a presigned link. External items link out directly.
async fn with_url(state: &AppState, item: GalleryItem) -> GalleryItemResponse {
    let url = match (&item.storage_key, &item.external_url) {
        (Some(key), _) => match state.storage.presigned_get_url(key, PRESIGNED_URL_TTL_SECS).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(item_id = %item.id, "Presigning failed: {e:#}");
                None
            }
        },
        (None, external) => external.clone(),
    };
    GalleryItemResponse { item, url }
}

/// GET /api/v1/gallery?category=&featured=&task_id=
async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
    Query(filter): Query<GalleryFilter>,
) -> HubResult<Json<Page<GalleryItemResponse>>> {
    let (offset, limit) = page_window(&page);
    let (items, total) = gallery::list_items(&state.db.pg, &filter, offset, limit).await?;

    let mut responses = Vec::with_capacity(items.len());
    for item in items {
        responses.push(with_url(&state, item).await);
    }
    Ok(Json(Page::new(responses, total, offset, limit)))
}

/// GET /api/v1/gallery/:item_id
async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
) -> HubResult<Json<GalleryItemResponse>> {
    let item = gallery::find_by_id(&state.db.pg, item_id)
        .await?
        .ok_or_else(|| HubError::not_found("Gallery item"))?;
    Ok(Json(with_url(&state, item).await))
}

/// POST /api/v1/gallery - Publish an approved upload or an external link.
async fn create_item(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateGalleryItemRequest>,
) -> HubResult<(StatusCode, Json<GalleryItemResponse>)> {
    auth.require(Permissions::MANAGE_GALLERY)?;
    validate_request(&body)?;
    validate_name(&body.title, "Title")?;

    let upload = match (body.file_upload_id, body.external_url.as_deref()) {
        (Some(file_id), None) => {
            let file = files::find_by_id(&state.db.pg, file_id)
                .await?
                .ok_or_else(|| HubError::not_found("File"))?;
            if file.status != UploadStatus::Approved || file.folder != StorageFolder::Permanent {
                return Err(HubError::validation(
                    "Only approved uploads can be published",
                ));
            }
            Some(file)
        }
        (None, Some(_)) => None,
        _ => {
            return Err(HubError::validation(
                "Provide exactly one of file_upload_id or external_url",
            ));
        }
    };

    if let Some(task_id) = body.task_id {
        tasks::find_by_id(&state.db.pg, task_id)
            .await?
            .ok_or_else(|| HubError::not_found("Task"))?;
    }

    let category = body.category.unwrap_or_else(|| {
        upload
            .as_ref()
            .map_or(GalleryCategory::Other, |f| GalleryCategory::from_content_type(&f.content_type))
    });

    let item = gallery::create_item(
        &state.db.pg,
        &gallery::NewGalleryItem {
            id: ids::generate_id(),
            title: body.title.trim(),
            description: body.description.as_deref(),
            category,
            file_upload_id: upload.as_ref().map(|f| f.id),
            storage_key: upload.as_ref().map(|f| f.storage_key.as_str()),
            external_url: body.external_url.as_deref(),
            task_id: body.task_id.or_else(|| upload.as_ref().and_then(|f| f.task_id)),
            created_by: Some(auth.user_id),
            is_featured: body.is_featured,
        },
    )
    .await?;

    tracing::info!(item_id = %item.id, by = %auth.user_id, "Gallery item published");
    Ok((StatusCode::CREATED, Json(with_url(&state, item).await)))
}

/// PATCH /api/v1/gallery/:item_id
async fn update_item(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Json(body): Json<UpdateGalleryItemRequest>,
) -> HubResult<Json<GalleryItemResponse>> {
    auth.require(Permissions::MANAGE_GALLERY)?;
    validate_request(&body)?;
    if let Some(title) = &body.title {
        validate_name(title, "Title")?;
    }

    let item = gallery::update_item(&state.db.pg, item_id, &body)
        .await?
        .ok_or_else(|| HubError::not_found("Gallery item"))?;

    tracing::info!(item_id = %item_id, "Gallery item updated");
    Ok(Json(with_url(&state, item).await))
}

/// DELETE /api/v1/gallery/:item_id - The underlying upload is kept.
async fn delete_item(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
) -> HubResult<StatusCode> {
    auth.require(Permissions::MANAGE_GALLERY)?;

    if !gallery::delete_item(&state.db.pg, item_id).await? {
        return Err(HubError::not_found("Gallery item"));
    }

    tracing::info!(item_id = %item_id, "Gallery item deleted");
    Ok(StatusCode::NO_CONTENT)
}
