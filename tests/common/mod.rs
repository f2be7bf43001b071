use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::mpsc;

use shopfloor_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::item,
    events::{self, EventSender},
    services::items::CreateItemInput,
    AppState,
};

/// Builds application state over a fresh in-memory SQLite database with
/// migrations applied. A single pooled connection keeps the in-memory
/// database shared across all service calls.
pub async fn test_state() -> AppState {
    let pool = db::establish_connection_with_config(&DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    })
    .await
    .expect("failed to create test database");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(events::process_events(rx));

    let cfg = AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: false,
        db_max_connections: 1,
        db_min_connections: 1,
    };

    AppState::new(Arc::new(pool), cfg, EventSender::new(tx))
}

/// Creates an item with the given SKU, stock, and reorder level.
pub async fn seed_item(
    state: &AppState,
    sku: &str,
    current_stock: i32,
    min_stock_level: i32,
) -> item::Model {
    state
        .item_service
        .create_item(CreateItemInput {
            sku: sku.to_string(),
            name: format!("Test item {}", sku),
            description: None,
            category: Some("test".to_string()),
            unit_of_measure: "ea".to_string(),
            current_stock,
            min_stock_level,
            unit_cost: Decimal::new(250, 2),
        })
        .await
        .expect("failed to create item")
}
