//! Equipment booking repository.

use chrono::NaiveDate;
use prhub_common::error::{HubError, HubResult};
use prhub_common::models::{
    BookingFilter, Equipment, EquipmentRequest, EquipmentStatus, RequestStatus, check_availability,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewBooking<'a> {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub task_id: Option<Uuid>,
    pub quantity: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub purpose: Option<&'a str>,
}

pub async fn create_request(pool: &PgPool, new: &NewBooking<'_>) -> Result<EquipmentRequest, sqlx::Error> {
    sqlx::query_as::<_, EquipmentRequest>(
        r#"
        INSERT INTO equipment_requests (id, equipment_id, user_id, task_id, quantity, start_date,
                                        end_date, purpose, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(new.id)
    .bind(new.equipment_id)
    .bind(new.user_id)
    .bind(new.task_id)
    .bind(new.quantity)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.purpose)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<EquipmentRequest>, sqlx::Error> {
    sqlx::query_as::<_, EquipmentRequest>("SELECT * FROM equipment_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List bookings, newest first. `user_id` restricts to one requester.
pub async fn list_requests(
    pool: &PgPool,
    filter: &BookingFilter,
    user_id: Option<Uuid>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<EquipmentRequest>, i64), sqlx::Error> {
    const WHERE: &str = r#"
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::uuid IS NULL OR equipment_id = $2)
          AND ($3::uuid IS NULL OR user_id = $3)
    "#;

    let items = sqlx::query_as::<_, EquipmentRequest>(&format!(
        "SELECT * FROM equipment_requests {WHERE} ORDER BY created_at DESC, id OFFSET $4 LIMIT $5"
    ))
    .bind(filter.status)
    .bind(filter.equipment_id)
    .bind(user_id)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM equipment_requests {WHERE}"))
        .bind(filter.status)
        .bind(filter.equipment_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok((items, total.0))
}

async fn lock_request(conn: &mut PgConnection, id: Uuid) -> HubResult<EquipmentRequest> {
    sqlx::query_as::<_, EquipmentRequest>("SELECT * FROM equipment_requests WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| HubError::not_found("Equipment request"))
}

async fn write_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: RequestStatus,
    reviewer_id: Option<Uuid>,
    comment: Option<&str>,
) -> Result<EquipmentRequest, sqlx::Error> {
    sqlx::query_as::<_, EquipmentRequest>(
        r#"
        UPDATE equipment_requests SET
            status = $2,
            reviewed_by = COALESCE($3, reviewed_by),
            review_comment = COALESCE($4, review_comment),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(reviewer_id)
    .bind(comment)
    .fetch_one(&mut *conn)
    .await
}

/// Approve a pending booking.
///
/// The equipment row is locked while availability is re-checked, so two
/// concurrent approvals cannot oversubscribe the same item.
pub async fn approve(
    pool: &PgPool,
    id: Uuid,
    reviewer_id: Uuid,
    comment: Option<&str>,
) -> HubResult<EquipmentRequest> {
    let mut tx = pool.begin().await?;

    let request = lock_request(&mut tx, id).await?;
    let next = request.status.transition(RequestStatus::Approved)?;

    let equipment = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1 FOR UPDATE")
        .bind(request.equipment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| HubError::not_found("Equipment"))?;

    if equipment.status != EquipmentStatus::Available {
        return Err(HubError::Unavailable {
            message: format!("{} is {}", equipment.name, equipment.status),
        });
    }

    let booked = super::equipment::booked_quantity(
        &mut *tx,
        equipment.id,
        request.start_date,
        request.end_date,
    )
    .await?;
    check_availability(equipment.quantity, booked, request.quantity)?;

    let approved = write_status(&mut tx, id, next, Some(reviewer_id), comment).await?;
    tx.commit().await?;
    Ok(approved)
}

/// Any other lifecycle move (reject, issue, return, cancel).
pub async fn transition(
    pool: &PgPool,
    id: Uuid,
    next: RequestStatus,
    reviewer_id: Option<Uuid>,
    comment: Option<&str>,
) -> HubResult<EquipmentRequest> {
    let mut tx = pool.begin().await?;

    let request = lock_request(&mut tx, id).await?;
    let next = request.status.transition(next)?;
    let updated = write_status(&mut tx, id, next, reviewer_id, comment).await?;

    tx.commit().await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{equipment, fixtures};
    use prhub_common::ids::generate_id;
    use prhub_common::models::EquipmentCategory;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    async fn book(pool: &PgPool, equipment_id: Uuid, user_id: Uuid, start: u32, end: u32) -> Uuid {
        let request = create_request(
            pool,
            &NewBooking {
                id: generate_id(),
                equipment_id,
                user_id,
                task_id: None,
                quantity: 1,
                start_date: day(start),
                end_date: day(end),
                purpose: Some("shoot"),
            },
        )
        .await
        .unwrap();
        request.id
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn overlapping_approval_refused_when_exhausted(pool: PgPool) {
        let reviewer = fixtures::volunteer(&pool, "reviewer").await;
        let camera = equipment::create_equipment(
            &pool,
            generate_id(),
            "Sony A7",
            EquipmentCategory::Camera,
            2,
            None,
        )
        .await
        .unwrap();

        let a = book(&pool, camera.id, reviewer.id, 1, 5).await;
        let b = book(&pool, camera.id, reviewer.id, 3, 7).await;
        let c = book(&pool, camera.id, reviewer.id, 5, 5).await;
        let later = book(&pool, camera.id, reviewer.id, 10, 12).await;

        approve(&pool, a, reviewer.id, None).await.unwrap();
        approve(&pool, b, reviewer.id, None).await.unwrap();

        let err = approve(&pool, c, reviewer.id, None).await.unwrap_err();
        assert!(matches!(err, HubError::Unavailable { .. }), "{err:?}");
        assert_eq!(find_by_id(&pool, c).await.unwrap().unwrap().status, RequestStatus::Pending);

        let ok = approve(&pool, later, reviewer.id, Some("fine")).await.unwrap();
        assert_eq!(ok.status, RequestStatus::Approved);
        assert_eq!(ok.reviewed_by, Some(reviewer.id));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_approvals_do_not_oversubscribe(pool: PgPool) {
        let reviewer = fixtures::volunteer(&pool, "reviewer").await;
        let mic = equipment::create_equipment(
            &pool,
            generate_id(),
            "Rode mic",
            EquipmentCategory::Audio,
            1,
            None,
        )
        .await
        .unwrap();
        let a = book(&pool, mic.id, reviewer.id, 1, 2).await;
        let b = book(&pool, mic.id, reviewer.id, 2, 3).await;

        let (ra, rb) = tokio::join!(
            approve(&pool, a, reviewer.id, None),
            approve(&pool, b, reviewer.id, None)
        );
        assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1, "{ra:?} / {rb:?}");
        let loser = if ra.is_ok() { rb } else { ra };
        assert!(matches!(loser, Err(HubError::Unavailable { .. })), "{loser:?}");
        assert_eq!(equipment::booked_quantity(&pool, mic.id, day(1), day(3)).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn decided_request_cannot_be_approved_again(pool: PgPool) {
        let reviewer = fixtures::volunteer(&pool, "reviewer").await;
        let tripod = equipment::create_equipment(
            &pool,
            generate_id(),
            "Tripod",
            EquipmentCategory::Tripod,
            3,
            None,
        )
        .await
        .unwrap();
        let id = book(&pool, tripod.id, reviewer.id, 1, 1).await;

        transition(&pool, id, RequestStatus::Rejected, Some(reviewer.id), Some("no"))
            .await
            .unwrap();
        let err = approve(&pool, id, reviewer.id, None).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }
}
