use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::common::{
    actor_from_headers, created_response, map_service_error, success_response, validate_input,
};
use crate::{
    errors::ApiError,
    services::items::{CreateItemInput, UpdateItemInput},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub unit_of_measure: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub current_stock: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub min_stock_level: i32,
    #[serde(default)]
    pub unit_cost: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema, Default)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_of_measure: Option<String>,
    /// When present and different from the stored value, the delta is
    /// applied through the stock ledger rather than written directly.
    pub current_stock: Option<i32>,
    #[validate(range(min = 0))]
    pub min_stock_level: Option<i32>,
    pub unit_cost: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListItemsParams {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LowStockParams {
    /// Scales `min_stock_level` before comparing; defaults to 1.0
    pub multiplier: Option<f64>,
}

/// Create an item
#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created"),
        (status = 409, description = "Duplicate SKU", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let item = state
        .item_service
        .create_item(CreateItemInput {
            sku: payload.sku,
            name: payload.name,
            description: payload.description,
            category: payload.category,
            unit_of_measure: payload.unit_of_measure,
            current_stock: payload.current_stock,
            min_stock_level: payload.min_stock_level,
            unit_cost: payload.unit_cost,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(item))
}

/// List items
#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(ListItemsParams),
    responses((status = 200, description = "Items")),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ListItemsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .item_service
        .list_items(params.include_inactive)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(items))
}

/// Get one item
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = i64, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .item_service
        .get_item(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(item))
}

/// Update an item; stock changes route through the ledger
#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    params(("id" = i64, Path, description = "Item id")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let actor = actor_from_headers(&headers);

    let item = state
        .item_service
        .update_item(
            id,
            UpdateItemInput {
                sku: payload.sku,
                name: payload.name,
                description: payload.description,
                category: payload.category,
                unit_of_measure: payload.unit_of_measure,
                current_stock: payload.current_stock,
                min_stock_level: payload.min_stock_level,
                unit_cost: payload.unit_cost,
                is_active: payload.is_active,
            },
            &actor,
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(item))
}

/// Active items at or below their scaled reorder point
#[utoipa::path(
    get,
    path = "/api/v1/items/low-stock",
    params(LowStockParams),
    responses((status = 200, description = "Low-stock items")),
    tag = "items"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    Query(params): Query<LowStockParams>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .item_service
        .low_stock(params.multiplier.unwrap_or(1.0))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(items))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/low-stock", get(low_stock))
        .route("/items/:id", get(get_item).put(update_item))
}
