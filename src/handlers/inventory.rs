use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::common::{
    actor_from_headers, created_response, map_service_error, success_response, validate_input,
};
use crate::{
    entities::stock_adjustment::AdjustmentType,
    errors::ApiError,
    services::stock_ledger::{AdjustmentReference, AdjustmentRequest, ReferenceKind},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAdjustmentRequest {
    pub item_id: i64,
    /// One of: adjustment, received, consumed, damaged, lost
    pub adjustment_type: String,
    /// Signed delta; zero is accepted (a "verified, no change" stocktake)
    pub quantity_change: i32,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub reference_id: Option<i64>,
    /// One of: purchase_order, work_order
    pub reference_type: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AdjustmentHistoryParams {
    pub item_id: Option<i64>,
}

/// Apply a manual stock adjustment
#[utoipa::path(
    post,
    path = "/api/v1/inventory/adjustments",
    request_body = CreateAdjustmentRequest,
    responses(
        (status = 201, description = "Adjustment applied"),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Would drive stock negative", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_adjustment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateAdjustmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let adjustment_type = AdjustmentType::parse(&payload.adjustment_type).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "unknown adjustment type '{}'",
            payload.adjustment_type
        ))
    })?;

    let reference = match (payload.reference_id, payload.reference_type.as_deref()) {
        (None, None) => None,
        (Some(id), Some(kind)) => {
            let kind = match kind {
                "purchase_order" => ReferenceKind::PurchaseOrder,
                "work_order" => ReferenceKind::WorkOrder,
                other => {
                    return Err(ApiError::BadRequest(format!(
                        "unknown reference type '{}'",
                        other
                    )))
                }
            };
            Some(AdjustmentReference { id, kind })
        }
        _ => {
            return Err(ApiError::BadRequest(
                "reference_id and reference_type must be provided together".to_string(),
            ))
        }
    };

    let actor = actor_from_headers(&headers);
    let adjustment = state
        .stock_ledger
        .apply(AdjustmentRequest {
            item_id: payload.item_id,
            adjustment_type,
            quantity_change: payload.quantity_change,
            reason: payload.reason,
            created_by: actor,
            reference,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(adjustment))
}

/// Adjustment history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/inventory/adjustments",
    params(AdjustmentHistoryParams),
    responses((status = 200, description = "Adjustments")),
    tag = "inventory"
)]
pub async fn list_adjustments(
    State(state): State<AppState>,
    Query(params): Query<AdjustmentHistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let adjustments = state
        .stock_ledger
        .history(params.item_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(adjustments))
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/inventory/adjustments",
        get(list_adjustments).post(create_adjustment),
    )
}
