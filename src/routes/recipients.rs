use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{NewRecipient, Recipient, RecipientChanges};
use crate::routes::{pagination_headers, ListQuery};
use crate::state::AppState;
use crate::store::Pagination;

#[derive(Deserialize, Validate)]
pub struct CreateRecipientRequest {
    #[validate(
        required(message = "name is a required field"),
        length(min = 1, max = 255, message = "name must be between 1 and 255 characters")
    )]
    pub name: Option<String>,
    #[validate(length(max = 255, message = "street must be at most 255 characters"))]
    pub street: Option<String>,
    #[validate(length(max = 255, message = "number must be at most 255 characters"))]
    pub number: Option<String>,
    #[validate(length(max = 255, message = "complement must be at most 255 characters"))]
    pub complement: Option<String>,
    #[validate(length(max = 2, message = "state must be at most 2 characters"))]
    pub state: Option<String>,
    #[validate(length(max = 255, message = "city must be at most 255 characters"))]
    pub city: Option<String>,
    #[validate(length(max = 255, message = "zip_code must be at most 255 characters"))]
    pub zip_code: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateRecipientRequest {
    #[validate(length(max = 255, message = "name must be at most 255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 255, message = "street must be at most 255 characters"))]
    pub street: Option<String>,
    #[validate(length(max = 255, message = "number must be at most 255 characters"))]
    pub number: Option<String>,
    #[validate(length(max = 255, message = "complement must be at most 255 characters"))]
    pub complement: Option<String>,
    #[validate(length(max = 2, message = "state must be at most 2 characters"))]
    pub state: Option<String>,
    #[validate(length(max = 255, message = "city must be at most 255 characters"))]
    pub city: Option<String>,
    #[validate(length(max = 255, message = "zip_code must be at most 255 characters"))]
    pub zip_code: Option<String>,
}

#[derive(Serialize, Clone)]
pub struct RecipientResponse {
    pub id: Uuid,
    pub name: String,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Recipient> for RecipientResponse {
    fn from(recipient: Recipient) -> Self {
        Self {
            id: recipient.id,
            name: recipient.name,
            street: recipient.street,
            number: recipient.number,
            complement: recipient.complement,
            state: recipient.state,
            city: recipient.city,
            zip_code: recipient.zip_code,
            created_at: recipient.created_at,
            updated_at: recipient.updated_at,
        }
    }
}

pub async fn list_recipients(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<(HeaderMap, Json<Vec<RecipientResponse>>)> {
    let page = state
        .store
        .list_recipients(
            query.q.as_deref(),
            Pagination::new(query.page, query.page_limit),
        )
        .await?;

    let headers = pagination_headers(&page);
    let rows = page.rows.into_iter().map(RecipientResponse::from).collect();
    Ok((headers, Json(rows)))
}

pub async fn create_recipient(
    State(state): State<AppState>,
    Json(payload): Json<CreateRecipientRequest>,
) -> AppResult<Json<RecipientResponse>> {
    payload.validate()?;
    let name = payload.name.unwrap_or_default();

    if state.store.find_recipient_by_name(&name).await?.is_some() {
        return Err(AppError::bad_request("Recipient already exists."));
    }

    let recipient = state
        .store
        .create_recipient(
            NewRecipient {
                id: Uuid::new_v4(),
                name,
                street: payload.street,
                number: payload.number,
                complement: payload.complement,
                state: payload.state,
                city: payload.city,
                zip_code: payload.zip_code,
            },
            state.clock.now(),
        )
        .await?;

    tracing::info!(recipient_id = %recipient.id, "recipient created");
    Ok(Json(RecipientResponse::from(recipient)))
}

pub async fn update_recipient(
    State(state): State<AppState>,
    Path(recipient_id): Path<Uuid>,
    Json(payload): Json<UpdateRecipientRequest>,
) -> AppResult<Json<RecipientResponse>> {
    payload.validate()?;

    let existing = state
        .store
        .find_recipient(recipient_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Recipient not found."))?;

    if let Some(name) = &payload.name {
        if !name.is_empty()
            && *name != existing.name
            && state.store.find_recipient_by_name(name).await?.is_some()
        {
            return Err(AppError::bad_request("Recipient already exists."));
        }
    }

    let changes = RecipientChanges {
        name: payload.name,
        street: payload.street,
        number: payload.number,
        complement: payload.complement,
        state: payload.state,
        city: payload.city,
        zip_code: payload.zip_code,
    };

    let recipient = state
        .store
        .update_recipient(recipient_id, &changes, state.clock.now())
        .await?;

    Ok(Json(RecipientResponse::from(recipient)))
}
