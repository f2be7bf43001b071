pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::numbering::{DocumentNumbering, NumberingService};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub item_service: services::items::ItemService,
    pub stock_ledger: services::stock_ledger::StockLedgerService,
    pub work_order_service: services::work_orders::WorkOrderService,
    pub purchase_order_service: services::purchase_orders::PurchaseOrderService,
}

impl AppState {
    /// Wires all services over one connection pool and event channel, with
    /// the default document numbering collaborator.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        Self::with_numbering(db, config, event_sender, Arc::new(DocumentNumbering))
    }

    pub fn with_numbering(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
        numbering: Arc<dyn NumberingService>,
    ) -> Self {
        let sender = Arc::new(event_sender.clone());
        Self {
            item_service: services::items::ItemService::new(db.clone(), sender.clone()),
            stock_ledger: services::stock_ledger::StockLedgerService::new(
                db.clone(),
                sender.clone(),
            ),
            work_order_service: services::work_orders::WorkOrderService::new(
                db.clone(),
                sender.clone(),
                numbering.clone(),
            ),
            purchase_order_service: services::purchase_orders::PurchaseOrderService::new(
                db.clone(),
                sender,
                numbering,
            ),
            db,
            config,
            event_sender,
        }
    }
}

/// Builds the application router: versioned API, health, swagger UI.
pub fn api_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(handlers::items::router())
        .merge(handlers::inventory::router())
        .merge(handlers::work_orders::router())
        .merge(handlers::purchase_orders::router());

    Router::new()
        .nest("/api/v1", api)
        .merge(handlers::health::router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
