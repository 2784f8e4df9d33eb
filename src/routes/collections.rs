use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::routes::deliveries::{delivery_response_for, DeliveryResponse};
use crate::routes::files::{read_upload_field, store_upload};
use crate::rules;
use crate::state::AppState;

/// Package pickup by the deliveryman. Subject to the collection time window
/// and the daily cap; the count-then-stamp sequence is not transactional,
/// so two simultaneous attempts at the cap boundary can both pass.
pub async fn collect_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<DeliveryResponse>> {
    let delivery = state
        .store
        .find_delivery(delivery_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Delivery not found."))?;

    let deliveryman_id = delivery
        .deliveryman_id
        .ok_or_else(|| AppError::bad_request("Deliveryman not found."))?;

    let now = state.clock.now();
    rules::check_collection_window(now)?;

    let (from, to) = rules::collection_day_range(now);
    let existing = state
        .store
        .count_collections_between(deliveryman_id, from, to)
        .await?;
    rules::check_daily_limit(existing as usize)?;

    let collected = state.store.mark_collected(delivery.id, now).await?;

    tracing::info!(
        delivery_id = %collected.id,
        deliveryman_id = %deliveryman_id,
        "delivery collected"
    );

    let response = delivery_response_for(&state, collected).await?;
    Ok(Json(response))
}

/// Drop-off confirmation. The signature image must come in the same
/// multipart request; its absence wins over any date problem.
pub async fn deliver_package(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<DeliveryResponse>> {
    let delivery = state
        .store
        .find_delivery(delivery_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Delivery not found."))?;

    let upload = read_upload_field(&mut multipart, "signature").await?;
    rules::check_signature_present(upload.is_some())?;
    let (name, bytes) = upload.unwrap_or_default();

    let now = state.clock.now();
    rules::check_end_after_start(delivery.start_date, None, now)?;

    let signature = store_upload(&state, name, bytes).await?;
    let delivered = state
        .store
        .mark_delivered(delivery.id, now, signature.id)
        .await?;

    tracing::info!(
        delivery_id = %delivered.id,
        signature_id = %signature.id,
        "delivery completed"
    );

    let response = delivery_response_for(&state, delivered).await?;
    Ok(Json(response))
}
