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
use crate::mail::{MailMessage, TEMPLATE_DELIVERY_CANCELED};
use crate::models::{DeliveryProblem, NewDeliveryProblem};
use crate::routes::deliveries::{to_delivery_response, DeliveryEmbeds, DeliveryResponse};
use crate::routes::{pagination_headers, ListQuery};
use crate::state::AppState;
use crate::store::{Page, Pagination};

#[derive(Deserialize, Validate)]
pub struct CreateProblemRequest {
    #[validate(
        required(message = "description is a required field"),
        length(
            min = 1,
            max = 255,
            message = "description must be between 1 and 255 characters"
        )
    )]
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct ProblemResponse {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub description: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryResponse>,
}

impl ProblemResponse {
    fn bare(problem: DeliveryProblem) -> Self {
        Self {
            id: problem.id,
            delivery_id: problem.delivery_id,
            description: problem.description,
            created_at: problem.created_at,
            updated_at: problem.updated_at,
            delivery: None,
        }
    }
}

/// Builds the listing rows with each problem's delivery embedded. A problem
/// whose delivery row is gone is still listed, just without the embed.
async fn problem_listing(
    state: &AppState,
    page: Page<DeliveryProblem>,
) -> AppResult<(HeaderMap, Json<Vec<ProblemResponse>>)> {
    let delivery_ids: Vec<Uuid> = page.rows.iter().map(|p| p.delivery_id).collect();
    let deliveries = state.store.find_deliveries(&delivery_ids).await?;
    let embeds = DeliveryEmbeds::load(state, &deliveries).await?;

    let mut by_id = std::collections::HashMap::new();
    for delivery in deliveries {
        let response = to_delivery_response(state, delivery, &embeds);
        by_id.insert(response.id, response);
    }

    let headers = pagination_headers(&page);
    let rows = page
        .rows
        .into_iter()
        .map(|problem| {
            let delivery = by_id.get(&problem.delivery_id).cloned();
            ProblemResponse {
                delivery,
                ..ProblemResponse::bare(problem)
            }
        })
        .collect();
    Ok((headers, Json(rows)))
}

pub async fn list_all_problems(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<(HeaderMap, Json<Vec<ProblemResponse>>)> {
    let page = state
        .store
        .list_problems(None, Pagination::new(query.page, query.page_limit))
        .await?;
    problem_listing(&state, page).await
}

pub async fn list_delivery_problems(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> AppResult<(HeaderMap, Json<Vec<ProblemResponse>>)> {
    let delivery = state
        .store
        .find_delivery(delivery_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Delivery not found."))?;

    let page = state
        .store
        .list_problems(
            Some(delivery.id),
            Pagination::new(query.page, query.page_limit),
        )
        .await?;
    problem_listing(&state, page).await
}

pub async fn create_problem(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
    Json(payload): Json<CreateProblemRequest>,
) -> AppResult<Json<ProblemResponse>> {
    payload.validate()?;

    let delivery = state
        .store
        .find_delivery(delivery_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Delivery not found."))?;

    let problem = state
        .store
        .create_problem(
            NewDeliveryProblem {
                id: Uuid::new_v4(),
                delivery_id: delivery.id,
                description: payload.description.unwrap_or_default(),
            },
            state.clock.now(),
        )
        .await?;

    tracing::info!(
        problem_id = %problem.id,
        delivery_id = %delivery.id,
        "delivery problem reported"
    );
    Ok(Json(ProblemResponse::bare(problem)))
}

/// Resolves a problem by canceling its delivery. The deliveryman is told by
/// mail, then the problem row is removed; the delivery itself stays,
/// soft-canceled.
pub async fn resolve_problem(
    State(state): State<AppState>,
    Path(problem_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let problem = state
        .store
        .find_problem(problem_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Delivery problem not found."))?;

    let delivery = state
        .store
        .find_delivery(problem.delivery_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Delivery not found."))?;

    let deliveryman = match delivery.deliveryman_id {
        Some(id) => state.store.find_deliveryman(id).await?,
        None => None,
    };
    let deliveryman = deliveryman.ok_or_else(|| AppError::bad_request("Deliveryman not found."))?;

    let recipient = match delivery.recipient_id {
        Some(id) => state.store.find_recipient(id).await?,
        None => None,
    };
    let recipient = recipient.ok_or_else(|| AppError::bad_request("Recipient not found."))?;

    state
        .store
        .mark_canceled(delivery.id, state.clock.now())
        .await?;

    state
        .mailer
        .send(MailMessage {
            to_name: deliveryman.name.clone(),
            to_address: deliveryman.email.clone(),
            subject: "Encomenda cancelada".to_string(),
            template: TEMPLATE_DELIVERY_CANCELED,
            context: vec![
                ("recipient", recipient.name),
                ("deliveryman", deliveryman.name),
                ("product", delivery.product),
                ("problem", problem.description.clone()),
            ],
        })
        .await?;

    state.store.delete_problem(problem.id).await?;

    tracing::info!(
        problem_id = %problem.id,
        delivery_id = %delivery.id,
        "delivery canceled over reported problem"
    );
    Ok(StatusCode::OK)
}
