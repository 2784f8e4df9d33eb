use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::mail::{MailMessage, TEMPLATE_DELIVERY_CREATED};
use crate::models::{
    Delivery, DeliveryChanges, DeliveryStatus, Deliveryman, NewDelivery, Recipient, StoredFile,
};
use crate::routes::deliverymen::DeliverymanResponse;
use crate::routes::files::FileResponse;
use crate::routes::recipients::RecipientResponse;
use crate::routes::{pagination_headers, ListQuery};
use crate::rules;
use crate::state::AppState;
use crate::store::Pagination;

#[derive(Deserialize, Validate)]
pub struct CreateDeliveryRequest {
    pub recipient_id: Option<Uuid>,
    pub deliveryman_id: Option<Uuid>,
    #[validate(
        required(message = "product is a required field"),
        length(min = 1, max = 255, message = "product must be between 1 and 255 characters")
    )]
    pub product: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateDeliveryRequest {
    pub recipient_id: Option<Uuid>,
    pub deliveryman_id: Option<Uuid>,
    pub signature_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "product must be between 1 and 255 characters"))]
    pub product: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

#[derive(Serialize, Clone)]
pub struct DeliveryResponse {
    pub id: Uuid,
    pub product: String,
    pub status: DeliveryStatus,
    pub recipient_id: Option<Uuid>,
    pub deliveryman_id: Option<Uuid>,
    pub signature_id: Option<Uuid>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub canceled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub recipient: Option<RecipientResponse>,
    pub deliveryman: Option<DeliverymanResponse>,
    pub signature: Option<FileResponse>,
}

/// Rows referenced by a batch of deliveries, loaded once per response so
/// each row's embeds come from maps instead of per-row queries.
pub(crate) struct DeliveryEmbeds {
    recipients: HashMap<Uuid, Recipient>,
    deliverymen: HashMap<Uuid, Deliveryman>,
    files: HashMap<Uuid, StoredFile>,
}

impl DeliveryEmbeds {
    pub(crate) async fn load(state: &AppState, deliveries: &[Delivery]) -> AppResult<Self> {
        let recipient_ids: Vec<Uuid> = deliveries.iter().filter_map(|d| d.recipient_id).collect();
        let deliveryman_ids: Vec<Uuid> =
            deliveries.iter().filter_map(|d| d.deliveryman_id).collect();

        let recipients = state.store.find_recipients(&recipient_ids).await?;
        let deliverymen = state.store.find_deliverymen(&deliveryman_ids).await?;

        // Signatures and avatars live in the same table; one batch covers both.
        let mut file_ids: Vec<Uuid> = deliveries.iter().filter_map(|d| d.signature_id).collect();
        file_ids.extend(deliverymen.iter().filter_map(|d| d.avatar_id));
        let files = state.store.find_files(&file_ids).await?;

        Ok(Self {
            recipients: recipients.into_iter().map(|r| (r.id, r)).collect(),
            deliverymen: deliverymen.into_iter().map(|d| (d.id, d)).collect(),
            files: files.into_iter().map(|f| (f.id, f)).collect(),
        })
    }
}

pub(crate) fn to_delivery_response(
    state: &AppState,
    delivery: Delivery,
    embeds: &DeliveryEmbeds,
) -> DeliveryResponse {
    let status = delivery.status();

    let recipient = delivery
        .recipient_id
        .and_then(|id| embeds.recipients.get(&id))
        .cloned()
        .map(RecipientResponse::from);

    let deliveryman = delivery
        .deliveryman_id
        .and_then(|id| embeds.deliverymen.get(&id))
        .map(|d| {
            let avatar = d.avatar_id.and_then(|id| embeds.files.get(&id)).cloned();
            DeliverymanResponse::new(&state.config, d.clone(), avatar)
        });

    let signature = delivery
        .signature_id
        .and_then(|id| embeds.files.get(&id))
        .cloned()
        .map(|f| FileResponse::new(&state.config, f));

    DeliveryResponse {
        id: delivery.id,
        product: delivery.product,
        status,
        recipient_id: delivery.recipient_id,
        deliveryman_id: delivery.deliveryman_id,
        signature_id: delivery.signature_id,
        start_date: delivery.start_date,
        end_date: delivery.end_date,
        canceled_at: delivery.canceled_at,
        created_at: delivery.created_at,
        updated_at: delivery.updated_at,
        recipient,
        deliveryman,
        signature,
    }
}

pub(crate) async fn delivery_response_for(
    state: &AppState,
    delivery: Delivery,
) -> AppResult<DeliveryResponse> {
    let embeds = DeliveryEmbeds::load(state, std::slice::from_ref(&delivery)).await?;
    Ok(to_delivery_response(state, delivery, &embeds))
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<(HeaderMap, Json<Vec<DeliveryResponse>>)> {
    let page = state
        .store
        .list_deliveries(
            query.q.as_deref(),
            Pagination::new(query.page, query.page_limit),
        )
        .await?;

    let embeds = DeliveryEmbeds::load(&state, &page.rows).await?;
    let headers = pagination_headers(&page);
    let rows = page
        .rows
        .into_iter()
        .map(|delivery| to_delivery_response(&state, delivery, &embeds))
        .collect();
    Ok((headers, Json(rows)))
}

pub async fn create_delivery(
    State(state): State<AppState>,
    Json(payload): Json<CreateDeliveryRequest>,
) -> AppResult<Json<DeliveryResponse>> {
    payload.validate()?;

    let recipient = match payload.recipient_id {
        Some(id) => state.store.find_recipient(id).await?,
        None => None,
    };
    let recipient = recipient.ok_or_else(|| AppError::bad_request("Recipient not found."))?;

    let deliveryman = match payload.deliveryman_id {
        Some(id) => state.store.find_deliveryman(id).await?,
        None => None,
    };
    let deliveryman = deliveryman.ok_or_else(|| AppError::bad_request("Deliveryman not found."))?;

    let product = payload.product.unwrap_or_default();

    let delivery = state
        .store
        .create_delivery(
            NewDelivery {
                id: Uuid::new_v4(),
                product: product.clone(),
                recipient_id: recipient.id,
                deliveryman_id: deliveryman.id,
            },
            state.clock.now(),
        )
        .await?;

    state
        .mailer
        .send(MailMessage {
            to_name: deliveryman.name.clone(),
            to_address: deliveryman.email.clone(),
            subject: "Nova encomenda para entrega".to_string(),
            template: TEMPLATE_DELIVERY_CREATED,
            context: vec![
                ("recipient", recipient.name.clone()),
                ("deliveryman", deliveryman.name.clone()),
                ("product", product),
            ],
        })
        .await?;

    tracing::info!(
        delivery_id = %delivery.id,
        deliveryman_id = %deliveryman.id,
        "delivery created"
    );

    let response = delivery_response_for(&state, delivery).await?;
    Ok(Json(response))
}

pub async fn show_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<DeliveryResponse>> {
    let delivery = state
        .store
        .find_delivery(delivery_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Delivery not found."))?;

    let response = delivery_response_for(&state, delivery).await?;
    Ok(Json(response))
}

pub async fn update_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryRequest>,
) -> AppResult<Json<DeliveryResponse>> {
    payload.validate()?;

    let delivery = state
        .store
        .find_delivery(delivery_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Delivery not found."))?;

    if let Some(id) = payload.recipient_id {
        if state.store.find_recipient(id).await?.is_none() {
            return Err(AppError::bad_request("Recipient not found."));
        }
    }
    if let Some(id) = payload.deliveryman_id {
        if state.store.find_deliveryman(id).await?.is_none() {
            return Err(AppError::bad_request("Deliveryman not found."));
        }
    }
    if let Some(id) = payload.signature_id {
        if state.store.find_file(id).await?.is_none() {
            return Err(AppError::bad_request("Signature not found."));
        }
    }

    if let Some(start) = payload.start_date {
        rules::check_start_date_window(start)?;
    }
    if let Some(end) = payload.end_date {
        rules::check_end_after_start(delivery.start_date, payload.start_date, end)?;
    }

    let changes = DeliveryChanges {
        product: payload.product,
        recipient_id: payload.recipient_id,
        deliveryman_id: payload.deliveryman_id,
        signature_id: payload.signature_id,
        start_date: payload.start_date,
        end_date: payload.end_date,
    };

    let updated = state
        .store
        .update_delivery(delivery.id, &changes, state.clock.now())
        .await?;

    let response = delivery_response_for(&state, updated).await?;
    Ok(Json(response))
}

/// Direct administrative cancellation. The row is kept with canceled_at
/// stamped; canceled deliveries still show up in the main listing.
pub async fn delete_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let delivery = state
        .store
        .find_delivery(delivery_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Delivery not found."))?;

    state
        .store
        .mark_canceled(delivery.id, state.clock.now())
        .await?;

    tracing::info!(delivery_id = %delivery.id, "delivery canceled");
    Ok(StatusCode::OK)
}
