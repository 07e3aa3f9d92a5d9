//! Moderation queue routes: registrations and file uploads.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, Query, State},
    middleware,
    routing::{get, post},
};
use chrono::Utc;
use prhub_common::{
    error::{HubError, HubResult},
    ids,
    models::{
        FileUpload, GalleryCategory, GalleryItem, ModerationEntry, ModerationFilter,
        ModerationItemType, ModerationStatus, NewNotification, NotificationKind, ReviewRequest,
        UserResponse,
    },
    pagination::{Page, PageParams},
    permissions::Permissions,
    validation::validate_request,
};
use prhub_db::{
    repository::{files, gallery::NewGalleryItem, moderation},
    storage::{self, ObjectStore},
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    AppState,
    middleware::AuthContext,
    notify,
    routes::{optional_json, page_window},
};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/moderation", get(list_entries))
        .route("/moderation/{entry_id}", get(get_entry))
        .route("/moderation/{entry_id}/approve", post(approve))
        .route("/moderation/{entry_id}/reject", post(reject))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth_middleware,
        ))
}

/// The decided entry plus whatever it changed.
#[derive(Serialize)]
struct DecisionResponse {
    entry: ModerationEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<FileUpload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gallery_item: Option<GalleryItem>,
}

/// GET /api/v1/moderation?status=&item_type=
async fn list_entries(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ModerationFilter>,
) -> HubResult<Json<Page<ModerationEntry>>> {
    auth.require(Permissions::MODERATE)?;

    let (offset, limit) = page_window(&page);
    let (items, total) = moderation::list_entries(&state.db.pg, &filter, offset, limit).await?;
    Ok(Json(Page::new(items, total, offset, limit)))
}

/// GET /api/v1/moderation/:entry_id
async fn get_entry(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> HubResult<Json<ModerationEntry>> {
    auth.require(Permissions::MODERATE)?;

    let entry = moderation::find_by_id(&state.db.pg, entry_id)
        .await?
        .ok_or_else(|| HubError::not_found("Moderation entry"))?;
    Ok(Json(entry))
}

/// POST /api/v1/moderation/:entry_id/approve
async fn approve(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
    body: Bytes,
) -> HubResult<Json<DecisionResponse>> {
    decide(&state, &auth, entry_id, ModerationStatus::Approved, &body).await
}

/// POST /api/v1/moderation/:entry_id/reject
async fn reject(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
    body: Bytes,
) -> HubResult<Json<DecisionResponse>> {
    decide(&state, &auth, entry_id, ModerationStatus::Rejected, &body).await
}

async fn decide(
    state: &Arc<AppState>,
    auth: &AuthContext,
    entry_id: Uuid,
    decision: ModerationStatus,
    body: &[u8],
) -> HubResult<Json<DecisionResponse>> {
    auth.require(Permissions::MODERATE)?;
    let review: ReviewRequest = optional_json(body)?;
    validate_request(&review)?;
    let comment = review.comment.as_deref().map(str::trim).filter(|c| !c.is_empty());

    let entry = moderation::find_by_id(&state.db.pg, entry_id)
        .await?
        .ok_or_else(|| HubError::not_found("Moderation entry"))?;
    // Fail early with the proper transition error before touching storage.
    entry.status.decide(decision)?;

    let response = match entry.item_type {
        ModerationItemType::Registration => {
            decide_registration(state, auth, entry_id, decision, comment).await?
        }
        ModerationItemType::FileUpload => {
            decide_file(state, auth, &entry, decision, comment).await?
        }
    };

    tracing::info!(
        entry_id = %entry_id,
        item_type = %entry.item_type,
        decision = %decision,
        by = %auth.user_id,
        "Moderation decision"
    );
    notify::spawn(state, decision_notification(&response.entry));

    Ok(Json(response))
}

async fn decide_registration(
    state: &Arc<AppState>,
    auth: &AuthContext,
    entry_id: Uuid,
    decision: ModerationStatus,
    comment: Option<&str>,
) -> HubResult<DecisionResponse> {
    let (entry, user) =
        moderation::decide_registration(&state.db.pg, entry_id, decision, auth.user_id, comment)
            .await?;

    if entry.status == ModerationStatus::Approved {
        notify::spawn_department_post(
            state,
            format!("Welcome to the team, {}!", user.full_name),
        );
    }

    Ok(DecisionResponse {
        entry,
        user: Some(user.into()),
        file: None,
        gallery_item: None,
    })
}

/// Approval copies the object to a permanent key unique to this attempt before
/// the database commit and only removes the temp object afterwards, so a
/// failure at any step leaves the upload readable.
async fn decide_file(
    state: &Arc<AppState>,
    auth: &AuthContext,
    entry: &ModerationEntry,
    decision: ModerationStatus,
    comment: Option<&str>,
) -> HubResult<DecisionResponse> {
    let file = files::find_by_id(&state.db.pg, entry.item_id)
        .await?
        .ok_or_else(|| HubError::not_found("File"))?;
    let temp_key = file.storage_key.clone();

    if decision == ModerationStatus::Rejected {
        let outcome = moderation::decide_file_upload(
            &state.db.pg,
            entry.id,
            decision,
            auth.user_id,
            comment,
            None,
            None,
        )
        .await?;

        if let Err(e) = state.storage.delete_object(&temp_key).await {
            tracing::warn!(file_id = %file.id, "Failed to delete rejected upload: {e:#}");
        }
        return Ok(DecisionResponse {
            entry: outcome.entry,
            user: None,
            file: Some(outcome.file),
            gallery_item: None,
        });
    }

    let permanent = storage::permanent_key(&temp_key, file.id, ids::generate_id(), Utc::now());
    let gallery_item = file.publish_to_gallery.then(|| gallery_entry(&file, &permanent, auth.user_id));
    let commit = moderation::decide_file_upload(
        &state.db.pg,
        entry.id,
        decision,
        auth.user_id,
        comment,
        Some(&permanent),
        gallery_item,
    );
    let outcome = promote_upload(&state.storage, &temp_key, &permanent, commit).await?;

    Ok(DecisionResponse {
        entry: outcome.entry,
        user: None,
        file: Some(outcome.file),
        gallery_item: outcome.gallery_item,
    })
}

/// Copies `temp_key` to `permanent`, then runs `commit`. On success the temp
/// object is removed; on failure only `permanent` is, since no other attempt
/// can have written it.
async fn promote_upload<S, T>(
    store: &S,
    temp_key: &str,
    permanent: &str,
    commit: impl Future<Output = HubResult<T>>,
) -> HubResult<T>
where
    S: ObjectStore,
{
    store
        .copy_object(temp_key, permanent)
        .await
        .map_err(|e| HubError::External {
            service: "storage".into(),
            message: format!("{e:#}"),
        })?;

    match commit.await {
        Ok(outcome) => {
            if let Err(e) = store.delete_object(temp_key).await {
                tracing::warn!(key = %temp_key, "Failed to delete temp object after approval: {e:#}");
            }
            Ok(outcome)
        }
        Err(e) => {
            if let Err(cleanup) = store.delete_object(permanent).await {
                tracing::warn!(key = %permanent, "Failed to remove orphaned copy: {cleanup:#}");
            }
            Err(e)
        }
    }
}

fn gallery_entry<'a>(file: &'a FileUpload, key: &'a str, moderator: Uuid) -> NewGalleryItem<'a> {
    NewGalleryItem {
        id: ids::generate_id(),
        title: file.title.as_deref().unwrap_or(&file.filename),
        description: None,
        category: GalleryCategory::from_content_type(&file.content_type),
        file_upload_id: Some(file.id),
        storage_key: Some(key),
        external_url: None,
        task_id: file.task_id,
        created_by: Some(moderator),
        is_featured: false,
    }
}

fn decision_notification(entry: &ModerationEntry) -> NewNotification {
    let approved = entry.status == ModerationStatus::Approved;
    let (title, mut message) = match (entry.item_type, approved) {
        (ModerationItemType::Registration, true) => (
            "Registration approved",
            "Welcome aboard! You can now take tasks.".to_string(),
        ),
        (ModerationItemType::Registration, false) => (
            "Registration rejected",
            "Your registration was not approved.".to_string(),
        ),
        (ModerationItemType::FileUpload, true) => {
            ("File approved", format!("{} was approved.", upload_name(entry)))
        }
        (ModerationItemType::FileUpload, false) => {
            ("File rejected", format!("{} was rejected.", upload_name(entry)))
        }
    };
    if let Some(comment) = entry.comment.as_deref() {
        message.push_str(&format!("\nComment: {comment}"));
    }

    NewNotification::new(entry.submitted_by, NotificationKind::Moderation, title, message)
        .with_payload(serde_json::json!({
            "moderation_id": entry.id,
            "item_type": entry.item_type,
            "item_id": entry.item_id,
            "status": entry.status,
        }))
}

fn upload_name(entry: &ModerationEntry) -> String {
    entry
        .payload
        .get("title")
        .and_then(|v| v.as_str())
        .or_else(|| entry.payload.get("filename").and_then(|v| v.as_str()))
        .map_or_else(|| "Your upload".to_string(), |name| format!("\"{name}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(item_type: ModerationItemType, status: ModerationStatus) -> ModerationEntry {
        ModerationEntry {
            id: Uuid::nil(),
            item_type,
            item_id: Uuid::nil(),
            submitted_by: Uuid::from_u128(7),
            status,
            reviewer_id: None,
            comment: None,
            payload: serde_json::json!({ "filename": "IMG_0042.jpg", "title": null }),
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    #[test]
    fn file_notification_names_the_upload() {
        let n = decision_notification(&entry(ModerationItemType::FileUpload, ModerationStatus::Approved));
        assert_eq!(n.user_id, Uuid::from_u128(7));
        assert_eq!(n.title, "File approved");
        assert_eq!(n.message, "\"IMG_0042.jpg\" was approved.");
    }

    #[test]
    fn rejection_carries_comment() {
        let mut e = entry(ModerationItemType::Registration, ModerationStatus::Rejected);
        e.comment = Some("Not a student".into());
        let n = decision_notification(&e);
        assert_eq!(n.kind, NotificationKind::Moderation);
        assert!(n.message.ends_with("Comment: Not a student"));
    }

    #[test]
    fn gallery_entry_falls_back_to_filename() {
        let now = Utc::now();
        let file = FileUpload {
            id: Uuid::from_u128(1),
            uploader_id: Uuid::from_u128(2),
            task_id: None,
            filename: "clip.mp4".into(),
            content_type: "video/mp4".into(),
            size: 10,
            storage_key: "temp/2/1.mp4".into(),
            folder: prhub_common::models::StorageFolder::Temp,
            status: prhub_common::models::UploadStatus::Pending,
            title: None,
            publish_to_gallery: true,
            sha256: String::new(),
            created_at: now,
            updated_at: now,
        };
        let item = gallery_entry(&file, "permanent/2026/05/1.mp4", Uuid::from_u128(3));
        assert_eq!(item.title, "clip.mp4");
        assert_eq!(item.category, GalleryCategory::Video);
        assert_eq!(item.storage_key, Some("permanent/2026/05/1.mp4"));
    }

    /// In-memory bucket that records every delete it is asked to do.
    #[derive(Default)]
    struct MemoryBucket {
        objects: std::sync::Mutex<std::collections::BTreeSet<String>>,
        deleted: std::sync::Mutex<Vec<String>>,
    }

    impl MemoryBucket {
        fn with(key: &str) -> Self {
            let bucket = Self::default();
            bucket.objects.lock().unwrap().insert(key.to_string());
            bucket
        }

        fn has(&self, key: &str) -> bool {
            self.objects.lock().unwrap().contains(key)
        }
    }

    impl ObjectStore for MemoryBucket {
        fn copy_object(&self, from: &str, to: &str) -> impl Future<Output = anyhow::Result<()>> + Send {
            let mut objects = self.objects.lock().unwrap();
            let res = if objects.contains(from) {
                objects.insert(to.to_string());
                Ok(())
            } else {
                Err(anyhow::anyhow!("no such key: {from}"))
            };
            std::future::ready(res)
        }

        fn delete_object(&self, key: &str) -> impl Future<Output = anyhow::Result<()>> + Send {
            self.objects.lock().unwrap().remove(key);
            self.deleted.lock().unwrap().push(key.to_string());
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn losing_approval_only_removes_its_own_copy() {
        let temp = "temp/2/1.jpg";
        let file = Uuid::from_u128(1);
        let when = Utc::now();
        let first = storage::permanent_key(temp, file, Uuid::from_u128(10), when);
        let second = storage::permanent_key(temp, file, Uuid::from_u128(20), when);
        assert_ne!(first, second);

        let bucket = MemoryBucket::with(temp);

        // The second moderator copies first, but the other decision commits
        // while theirs is still in flight, so theirs then fails the status check.
        let losing_commit = async {
            promote_upload(&bucket, temp, &first, async { HubResult::Ok(()) }).await?;
            HubResult::<()>::Err(HubError::InvalidTransition {
                entity: "moderation".into(),
                from: "approved".into(),
                to: "approved".into(),
            })
        };
        let err = promote_upload(&bucket, temp, &second, losing_commit).await.unwrap_err();

        assert!(matches!(err, HubError::InvalidTransition { .. }));
        assert!(bucket.has(&first), "winning copy must survive");
        assert!(!bucket.has(&second));
        assert!(!bucket.has(temp));
        let deleted = bucket.deleted.lock().unwrap();
        assert!(!deleted.contains(&first), "deleted another attempt's key: {deleted:?}");
        assert_eq!(deleted.as_slice(), [temp.to_string(), second.clone()]);
    }

    #[tokio::test]
    async fn failed_copy_skips_commit() {
        let bucket = MemoryBucket::default();
        let committed = std::sync::atomic::AtomicBool::new(false);
        let err = promote_upload(&bucket, "temp/gone.jpg", "permanent/x.jpg", async {
            committed.store(true, std::sync::atomic::Ordering::SeqCst);
            HubResult::Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, HubError::External { .. }));
        assert!(!committed.load(std::sync::atomic::Ordering::SeqCst));
        assert!(bucket.deleted.lock().unwrap().is_empty());
    }

    mod access {
        use super::*;
        use axum::{body::Body, http::Request, http::StatusCode};
        use prhub_common::models::Role;
        use prhub_db::repository::users;
        use sqlx::PgPool;
        use tower::ServiceExt;

        use crate::test_support;

        async fn bearer(pool: &PgPool, username: &str, role: Role) -> String {
            let user = users::create_admin(pool, ids::generate_id(), username, "Member", "x")
                .await
                .unwrap();
            let user = users::assign_role(pool, user.id, role).await.unwrap();
            let pair = crate::auth::issue_tokens(&user, &test_support::config().auth).unwrap();
            format!("Bearer {}", pair.access_token)
        }

        async fn call(pool: &PgPool, method: &str, uri: &str, token: &str) -> StatusCode {
            test_support::app_with(pool.clone())
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .header("authorization", token)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap()
                .status()
        }

        #[sqlx::test(migrations = "../prhub-db/migrations")]
        async fn valid_token_without_moderate_is_forbidden(pool: PgPool) {
            test_support::config();
            let novice = bearer(&pool, "novice", Role::Novice).await;
            let entry = Uuid::now_v7();

            let queue = "/api/v1/moderation";
            let approve = format!("/api/v1/moderation/{entry}/approve");
            assert_eq!(call(&pool, "GET", queue, &novice).await, StatusCode::FORBIDDEN);
            assert_eq!(call(&pool, "POST", &approve, &novice).await, StatusCode::FORBIDDEN);

            let vp = bearer(&pool, "vp", Role::Vp4pr).await;
            assert_eq!(call(&pool, "GET", queue, &vp).await, StatusCode::OK);
            assert_eq!(call(&pool, "POST", &approve, &vp).await, StatusCode::NOT_FOUND);
        }
    }
}
