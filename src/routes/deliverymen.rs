use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Deliveryman, DeliverymanChanges, NewDeliveryman, StoredFile};
use crate::routes::deliveries::{to_delivery_response, DeliveryEmbeds, DeliveryResponse};
use crate::routes::files::FileResponse;
use crate::routes::{pagination_headers, ListQuery};
use crate::state::AppState;
use crate::store::Pagination;

#[derive(Deserialize, Validate)]
pub struct CreateDeliverymanRequest {
    #[validate(
        required(message = "name is a required field"),
        length(min = 1, max = 255, message = "name must be between 1 and 255 characters")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "email is a required field"),
        email(message = "email must be a valid email")
    )]
    pub email: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateDeliverymanRequest {
    #[validate(length(max = 255, message = "name must be at most 255 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid email"))]
    pub email: Option<String>,
    pub avatar_id: Option<Uuid>,
}

/// Query string for a deliveryman's own delivery listing. Any non-empty
/// `delivered` value selects the finished deliveries.
#[derive(Deserialize)]
pub struct DeliverymanDeliveriesQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    #[serde(rename = "pageLimit")]
    pub page_limit: Option<i64>,
    pub delivered: Option<String>,
}

#[derive(Serialize, Clone)]
pub struct DeliverymanResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_id: Option<Uuid>,
    pub avatar: Option<FileResponse>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl DeliverymanResponse {
    pub fn new(config: &AppConfig, deliveryman: Deliveryman, avatar: Option<StoredFile>) -> Self {
        Self {
            id: deliveryman.id,
            name: deliveryman.name,
            email: deliveryman.email,
            avatar_id: deliveryman.avatar_id,
            avatar: avatar.map(|file| FileResponse::new(config, file)),
            created_at: deliveryman.created_at,
            updated_at: deliveryman.updated_at,
        }
    }
}

async fn response_with_avatar(
    state: &AppState,
    deliveryman: Deliveryman,
) -> AppResult<DeliverymanResponse> {
    let avatar = match deliveryman.avatar_id {
        Some(id) => state.store.find_file(id).await?,
        None => None,
    };
    Ok(DeliverymanResponse::new(&state.config, deliveryman, avatar))
}

pub async fn list_deliverymen(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<(HeaderMap, Json<Vec<DeliverymanResponse>>)> {
    let page = state
        .store
        .list_deliverymen(
            query.q.as_deref(),
            Pagination::new(query.page, query.page_limit),
        )
        .await?;

    let avatar_ids: Vec<Uuid> = page.rows.iter().filter_map(|d| d.avatar_id).collect();
    let avatars = state.store.find_files(&avatar_ids).await?;
    let avatars: std::collections::HashMap<Uuid, StoredFile> =
        avatars.into_iter().map(|f| (f.id, f)).collect();

    let headers = pagination_headers(&page);
    let rows = page
        .rows
        .into_iter()
        .map(|deliveryman| {
            let avatar = deliveryman
                .avatar_id
                .and_then(|id| avatars.get(&id))
                .cloned();
            DeliverymanResponse::new(&state.config, deliveryman, avatar)
        })
        .collect();
    Ok((headers, Json(rows)))
}

pub async fn create_deliveryman(
    State(state): State<AppState>,
    Json(payload): Json<CreateDeliverymanRequest>,
) -> AppResult<Json<DeliverymanResponse>> {
    payload.validate()?;
    let name = payload.name.unwrap_or_default();
    let email = payload.email.unwrap_or_default();

    if state.store.find_deliveryman_by_name(&name).await?.is_some()
        || state
            .store
            .find_deliveryman_by_email(&email)
            .await?
            .is_some()
    {
        return Err(AppError::bad_request("Deliveryman already exists."));
    }

    let deliveryman = state
        .store
        .create_deliveryman(
            NewDeliveryman {
                id: Uuid::new_v4(),
                name,
                email,
                avatar_id: None,
            },
            state.clock.now(),
        )
        .await?;

    tracing::info!(deliveryman_id = %deliveryman.id, "deliveryman created");
    Ok(Json(DeliverymanResponse::new(
        &state.config,
        deliveryman,
        None,
    )))
}

pub async fn update_deliveryman(
    State(state): State<AppState>,
    Path(deliveryman_id): Path<Uuid>,
    Json(payload): Json<UpdateDeliverymanRequest>,
) -> AppResult<Json<DeliverymanResponse>> {
    payload.validate()?;

    let existing = state
        .store
        .find_deliveryman(deliveryman_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Deliveryman not found."))?;

    if let Some(name) = &payload.name {
        if !name.is_empty()
            && *name != existing.name
            && state.store.find_deliveryman_by_name(name).await?.is_some()
        {
            return Err(AppError::bad_request("Name already exists."));
        }
    }
    if let Some(email) = &payload.email {
        if !email.is_empty()
            && *email != existing.email
            && state
                .store
                .find_deliveryman_by_email(email)
                .await?
                .is_some()
        {
            return Err(AppError::bad_request("Email already exists."));
        }
    }
    if let Some(avatar_id) = payload.avatar_id {
        if state.store.find_file(avatar_id).await?.is_none() {
            return Err(AppError::bad_request("Avatar not found."));
        }
    }

    let changes = DeliverymanChanges {
        name: payload.name,
        email: payload.email,
        avatar_id: payload.avatar_id,
    };

    let deliveryman = state
        .store
        .update_deliveryman(deliveryman_id, &changes, state.clock.now())
        .await?;

    let response = response_with_avatar(&state, deliveryman).await?;
    Ok(Json(response))
}

/// Hard delete; the deliveryman's deliveries survive with the reference
/// cleared by the foreign key.
pub async fn delete_deliveryman(
    State(state): State<AppState>,
    Path(deliveryman_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let deliveryman = state
        .store
        .find_deliveryman(deliveryman_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Deliveryman not found."))?;

    state.store.delete_deliveryman(deliveryman.id).await?;

    tracing::info!(deliveryman_id = %deliveryman.id, "deliveryman deleted");
    Ok(StatusCode::OK)
}

pub async fn list_deliveryman_deliveries(
    State(state): State<AppState>,
    Path(deliveryman_id): Path<Uuid>,
    Query(query): Query<DeliverymanDeliveriesQuery>,
) -> AppResult<(HeaderMap, Json<Vec<DeliveryResponse>>)> {
    let deliveryman = state
        .store
        .find_deliveryman(deliveryman_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Deliveryman not found."))?;

    let delivered = query
        .delivered
        .as_deref()
        .is_some_and(|value| !value.is_empty());

    let page = state
        .store
        .list_deliveries_for_deliveryman(
            deliveryman.id,
            delivered,
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
