use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post, put},
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
    entities::work_order::{WorkOrderPriority, WorkOrderStatus},
    errors::ApiError,
    services::work_orders::{CreateWorkOrderInput, UpdateWorkOrderInput, WorkOrderLineInput},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct WorkOrderLineRequest {
    pub item_id: i64,
    #[validate(range(min = 1))]
    pub quantity_planned: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateWorkOrderRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    /// One of: low, normal, high, urgent; defaults to normal
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
    pub estimated_hours: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lines: Vec<WorkOrderLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema, Default)]
pub struct UpdateWorkOrderRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
    pub estimated_hours: Option<Decimal>,
    pub actual_hours: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    /// A target of "completed" consumes material through the ledger,
    /// exactly as the dedicated completion endpoint does
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Default)]
pub struct CompleteWorkOrderRequest {
    pub actual_hours: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordUsageRequest {
    #[validate(range(min = 0))]
    pub quantity_used: i32,
}

fn parse_priority(s: &str) -> Result<WorkOrderPriority, ApiError> {
    WorkOrderPriority::parse(s)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown priority '{}'", s)))
}

/// Create a work order
#[utoipa::path(
    post,
    path = "/api/v1/work-orders",
    request_body = CreateWorkOrderRequest,
    responses((status = 201, description = "Work order created")),
    tag = "work-orders"
)]
pub async fn create_work_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateWorkOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let priority = match payload.priority.as_deref() {
        Some(p) => parse_priority(p)?,
        None => WorkOrderPriority::Normal,
    };
    let actor = actor_from_headers(&headers);

    let details = state
        .work_order_service
        .create_work_order(
            CreateWorkOrderInput {
                title: payload.title,
                description: payload.description,
                priority,
                assigned_to: payload.assigned_to,
                estimated_hours: payload.estimated_hours,
                due_date: payload.due_date,
                lines: payload
                    .lines
                    .into_iter()
                    .map(|l| WorkOrderLineInput {
                        item_id: l.item_id,
                        quantity_planned: l.quantity_planned,
                    })
                    .collect(),
            },
            &actor,
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(details))
}

/// List work orders
#[utoipa::path(
    get,
    path = "/api/v1/work-orders",
    params(PaginationParams),
    responses((status = 200, description = "Work orders")),
    tag = "work-orders"
)]
pub async fn list_work_orders(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (work_orders, total) = state
        .work_order_service
        .list_work_orders(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse {
        data: work_orders,
        page: params.page,
        per_page: params.per_page,
        total,
    }))
}

/// Get a work order with its lines
#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}",
    params(("id" = i64, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Work order"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn get_work_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .work_order_service
        .get_work_order(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(details))
}

/// Generic update; a status of "completed" triggers consumption
#[utoipa::path(
    put,
    path = "/api/v1/work-orders/{id}",
    params(("id" = i64, Path, description = "Work order id")),
    request_body = UpdateWorkOrderRequest,
    responses(
        (status = 200, description = "Work order updated"),
        (status = 409, description = "Already completed", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid transition or insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn update_work_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<UpdateWorkOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let status = match payload.status.as_deref() {
        Some(s) => Some(
            WorkOrderStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{}'", s)))?,
        ),
        None => None,
    };
    let priority = match payload.priority.as_deref() {
        Some(p) => Some(parse_priority(p)?),
        None => None,
    };
    let actor = actor_from_headers(&headers);

    let work_order = state
        .work_order_service
        .update_work_order(
            id,
            UpdateWorkOrderInput {
                title: payload.title,
                description: payload.description,
                priority,
                assigned_to: payload.assigned_to,
                estimated_hours: payload.estimated_hours,
                actual_hours: payload.actual_hours,
                due_date: payload.due_date,
                status,
            },
            &actor,
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(work_order))
}

/// Start a work order
#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/start",
    params(("id" = i64, Path, description = "Work order id")),
    responses((status = 200, description = "Work order started")),
    tag = "work-orders"
)]
pub async fn start_work_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let work_order = state
        .work_order_service
        .start_work_order(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(work_order))
}

/// Cancel a work order (no inventory effect)
#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/cancel",
    params(("id" = i64, Path, description = "Work order id")),
    responses((status = 200, description = "Work order cancelled")),
    tag = "work-orders"
)]
pub async fn cancel_work_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let work_order = state
        .work_order_service
        .cancel_work_order(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(work_order))
}

/// Complete a work order, consuming used material through the ledger
#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/complete",
    params(("id" = i64, Path, description = "Work order id")),
    request_body = CompleteWorkOrderRequest,
    responses(
        (status = 200, description = "Work order completed"),
        (status = 409, description = "Already completed", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "work-orders"
)]
pub async fn complete_work_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<CompleteWorkOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers);
    let work_order = state
        .work_order_service
        .complete_work_order(id, payload.actual_hours, &actor)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(work_order))
}

/// Record the quantity a line actually used, ahead of completion
#[utoipa::path(
    put,
    path = "/api/v1/work-orders/{id}/items/{line_id}/usage",
    params(
        ("id" = i64, Path, description = "Work order id"),
        ("line_id" = i64, Path, description = "Line id")
    ),
    request_body = RecordUsageRequest,
    responses((status = 200, description = "Usage recorded")),
    tag = "work-orders"
)]
pub async fn record_usage(
    State(state): State<AppState>,
    Path((id, line_id)): Path<(i64, i64)>,
    Json(payload): Json<RecordUsageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let line = state
        .work_order_service
        .record_usage(id, line_id, payload.quantity_used)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(line))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/work-orders", get(list_work_orders).post(create_work_order))
        .route("/work-orders/:id", get(get_work_order).put(update_work_order))
        .route("/work-orders/:id/start", post(start_work_order))
        .route("/work-orders/:id/cancel", post(cancel_work_order))
        .route("/work-orders/:id/complete", post(complete_work_order))
        .route("/work-orders/:id/items/:line_id/usage", put(record_usage))
}
