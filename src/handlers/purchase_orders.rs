use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{
    actor_from_headers, created_response, map_service_error, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    entities::purchase_order::PurchaseOrderStatus,
    errors::ApiError,
    services::purchase_orders::{CreatePurchaseOrderInput, PurchaseOrderLineInput},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PurchaseOrderLineRequest {
    pub item_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: i64,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<PurchaseOrderLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct TransitionStatusRequest {
    /// One of: draft, pending, approved, ordered, received, cancelled
    #[validate(length(min = 1))]
    pub status: String,
}

/// Create a purchase order (status draft)
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders",
    request_body = CreatePurchaseOrderRequest,
    responses(
        (status = 201, description = "Purchase order created"),
        (status = 404, description = "Unknown item on a line", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = actor_from_headers(&headers);

    let details = state
        .purchase_order_service
        .create_purchase_order(
            CreatePurchaseOrderInput {
                supplier_id: payload.supplier_id,
                expected_delivery_date: payload.expected_delivery_date,
                notes: payload.notes,
                lines: payload
                    .items
                    .into_iter()
                    .map(|l| PurchaseOrderLineInput {
                        item_id: l.item_id,
                        quantity: l.quantity,
                        unit_price: l.unit_price,
                    })
                    .collect(),
            },
            &actor,
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(details))
}

/// List purchase orders
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders",
    params(PaginationParams),
    responses((status = 200, description = "Purchase orders")),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (orders, total) = state
        .purchase_order_service
        .list_purchase_orders(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse {
        data: orders,
        page: params.page,
        per_page: params.per_page,
        total,
    }))
}

/// Get a purchase order with its lines
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = i64, Path, description = "Purchase order id")),
    responses(
        (status = 200, description = "Purchase order"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .purchase_order_service
        .get_purchase_order(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(details))
}

/// Transition status; "received" books the outstanding remainder into stock
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/status",
    params(("id" = i64, Path, description = "Purchase order id")),
    request_body = TransitionStatusRequest,
    responses(
        (status = 200, description = "Status changed"),
        (status = 422, description = "Transition not permitted", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn transition_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<TransitionStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let status = PurchaseOrderStatus::parse(&payload.status)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{}'", payload.status)))?;
    let actor = actor_from_headers(&headers);

    let order = state
        .purchase_order_service
        .transition_status(id, status, &actor)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/purchase-orders",
            get(list_purchase_orders).post(create_purchase_order),
        )
        .route("/purchase-orders/:id", get(get_purchase_order))
        .route("/purchase-orders/:id/status", post(transition_status))
}
