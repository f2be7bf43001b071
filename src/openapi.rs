use utoipa::OpenApi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::items::create_item,
        handlers::items::list_items,
        handlers::items::get_item,
        handlers::items::update_item,
        handlers::items::low_stock,
        handlers::inventory::create_adjustment,
        handlers::inventory::list_adjustments,
        handlers::work_orders::create_work_order,
        handlers::work_orders::list_work_orders,
        handlers::work_orders::get_work_order,
        handlers::work_orders::update_work_order,
        handlers::work_orders::start_work_order,
        handlers::work_orders::cancel_work_order,
        handlers::work_orders::complete_work_order,
        handlers::work_orders::record_usage,
        handlers::purchase_orders::create_purchase_order,
        handlers::purchase_orders::list_purchase_orders,
        handlers::purchase_orders::get_purchase_order,
        handlers::purchase_orders::transition_status,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        handlers::items::CreateItemRequest,
        handlers::items::UpdateItemRequest,
        handlers::inventory::CreateAdjustmentRequest,
        handlers::work_orders::WorkOrderLineRequest,
        handlers::work_orders::CreateWorkOrderRequest,
        handlers::work_orders::UpdateWorkOrderRequest,
        handlers::work_orders::CompleteWorkOrderRequest,
        handlers::work_orders::RecordUsageRequest,
        handlers::purchase_orders::PurchaseOrderLineRequest,
        handlers::purchase_orders::CreatePurchaseOrderRequest,
        handlers::purchase_orders::TransitionStatusRequest,
    )),
    tags(
        (name = "items", description = "Item catalog and low-stock reporting"),
        (name = "inventory", description = "Stock ledger: adjustments and history"),
        (name = "work-orders", description = "Work order lifecycle and material consumption"),
        (name = "purchase-orders", description = "Purchase order lifecycle and receiving"),
        (name = "health", description = "Service health"),
    ),
    info(
        title = "shopfloor-api",
        description = "Small-business ERP backend: audited inventory ledger, purchasing, and work orders",
    )
)]
pub struct ApiDoc;
