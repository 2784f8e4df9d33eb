use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::store::Page;
use crate::{auth::AuthenticatedUser, state::AppState};

pub mod collections;
pub mod deliveries;
pub mod deliverymen;
pub mod files;
pub mod health;
pub mod problems;
pub mod recipients;
pub mod sessions;

/// Query string shared by the paginated listings.
#[derive(Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    #[serde(rename = "pageLimit")]
    pub page_limit: Option<i64>,
}

/// Totals travel out of band; the body stays a plain JSON array.
pub(crate) fn pagination_headers<T>(page: &Page<T>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-api-total"),
        HeaderValue::from(page.total),
    );
    headers.insert(
        HeaderName::from_static("x-api-totalpages"),
        HeaderValue::from(page.total_pages),
    );
    headers
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let recipients_routes = Router::new()
        .route(
            "/",
            get(recipients::list_recipients).post(recipients::create_recipient),
        )
        .route("/:id", put(recipients::update_recipient));

    let deliverymen_routes = Router::new()
        .route(
            "/",
            get(deliverymen::list_deliverymen).post(deliverymen::create_deliveryman),
        )
        .route(
            "/:id",
            put(deliverymen::update_deliveryman).delete(deliverymen::delete_deliveryman),
        )
        .route(
            "/:id/deliveries",
            get(deliverymen::list_deliveryman_deliveries),
        );

    let deliveries_routes = Router::new()
        .route(
            "/",
            get(deliveries::list_deliveries).post(deliveries::create_delivery),
        )
        .route("/problems", get(problems::list_all_problems))
        .route(
            "/:id",
            get(deliveries::show_delivery)
                .put(deliveries::update_delivery)
                .delete(deliveries::delete_delivery),
        )
        .route(
            "/:id/collection",
            post(collections::collect_delivery).put(collections::deliver_package),
        )
        .route(
            "/:id/problems",
            get(problems::list_delivery_problems).post(problems::create_problem),
        );

    let problems_routes =
        Router::new().route("/:id/cancel-delivery", delete(problems::resolve_problem));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .route("/files", post(files::upload_file))
        .nest("/recipients", recipients_routes)
        .nest("/deliverymen", deliverymen_routes)
        .nest("/deliveries", deliveries_routes)
        .nest("/problems", problems_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .route("/sessions", post(sessions::create_session))
        .route("/files/:path", get(files::serve_file))
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 32))
}
