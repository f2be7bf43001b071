mod common;

use assert_matches::assert_matches;

use shopfloor_api::{
    entities::stock_adjustment::AdjustmentType,
    errors::ServiceError,
    services::items::{CreateItemInput, UpdateItemInput},
    services::stock_ledger::AdjustmentRequest,
};

fn manual(item_id: i64, delta: i32, reason: &str) -> AdjustmentRequest {
    AdjustmentRequest {
        item_id,
        adjustment_type: AdjustmentType::Adjustment,
        quantity_change: delta,
        reason: reason.to_string(),
        created_by: "tester".to_string(),
        reference: None,
    }
}

#[tokio::test]
async fn apply_records_snapshots_and_updates_stock() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-001", 100, 10).await;

    let adjustment = state
        .stock_ledger
        .apply(manual(item.id, -30, "count"))
        .await
        .expect("adjustment should apply");

    assert_eq!(adjustment.previous_stock, 100);
    assert_eq!(adjustment.new_stock, 70);
    assert_eq!(adjustment.quantity_change, -30);
    assert_eq!(adjustment.created_by, "tester");

    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 70);
}

#[tokio::test]
async fn negative_stock_is_rejected_without_side_effects() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-002", 100, 10).await;

    state
        .stock_ledger
        .apply(manual(item.id, -30, "count"))
        .await
        .unwrap();

    let err = state
        .stock_ledger
        .apply(manual(item.id, -80, "oops"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 70);

    let history = state.stock_ledger.history(Some(item.id)).await.unwrap();
    assert_eq!(history.len(), 1, "the rejected call must not add a row");
}

#[tokio::test]
async fn zero_delta_stocktake_is_accepted_and_audited() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-003", 40, 5).await;

    let adjustment = state
        .stock_ledger
        .apply(manual(item.id, 0, "verified, no change"))
        .await
        .expect("zero delta should be accepted");

    assert_eq!(adjustment.previous_stock, 40);
    assert_eq!(adjustment.new_stock, 40);

    let history = state.stock_ledger.history(Some(item.id)).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn oversized_delta_is_rejected_without_side_effects() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-015", 1, 0).await;

    let err = state
        .stock_ledger
        .apply(manual(item.id, i32::MAX, "bulk intake"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 1);
    assert!(state
        .stock_ledger
        .history(Some(item.id))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn item_update_with_oversized_target_is_rejected() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-016", 10, 1).await;

    let err = state
        .item_service
        .update_item(
            item.id,
            UpdateItemInput {
                current_stock: Some(i32::MIN),
                ..Default::default()
            },
            "editor",
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 10);
}

#[tokio::test]
async fn concurrent_adjustments_chain_without_gaps() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-017", 100, 10).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = state.stock_ledger.clone();
        let item_id = item.id;
        handles.push(tokio::spawn(async move {
            ledger.apply(manual(item_id, -5, "concurrent draw")).await
        }));
    }
    for handle in handles {
        handle
            .await
            .expect("task panicked")
            .expect("adjustment failed");
    }

    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 50);

    // Newest first: every row must start exactly where the next-older
    // row ended, so no two appliers saw the same previous_stock.
    let history = state.stock_ledger.history(Some(item.id)).await.unwrap();
    assert_eq!(history.len(), 10);
    for pair in history.windows(2) {
        assert_eq!(pair[0].previous_stock, pair[1].new_stock);
    }
    assert_eq!(history[history.len() - 1].previous_stock, 100);
    assert_eq!(history[0].new_stock, 50);
}

#[tokio::test]
async fn unknown_item_yields_not_found() {
    let state = common::test_state().await;
    let err = state
        .stock_ledger
        .apply(manual(9999, 5, "ghost"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn history_is_newest_first_and_filterable() {
    let state = common::test_state().await;
    let a = common::seed_item(&state, "WID-004", 50, 5).await;
    let b = common::seed_item(&state, "WID-005", 50, 5).await;

    state.stock_ledger.apply(manual(a.id, -1, "first")).await.unwrap();
    state.stock_ledger.apply(manual(a.id, -2, "second")).await.unwrap();
    state.stock_ledger.apply(manual(b.id, -3, "other item")).await.unwrap();

    let history = state.stock_ledger.history(Some(a.id)).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].reason, "second");
    assert_eq!(history[1].reason, "first");

    let all = state.stock_ledger.history(None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].reason, "other item");
}

#[tokio::test]
async fn item_creation_writes_no_opening_balance_row() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-006", 250, 10).await;

    let history = state.stock_ledger.history(Some(item.id)).await.unwrap();
    assert!(history.is_empty(), "initial stock carries no ledger entry");
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let state = common::test_state().await;
    common::seed_item(&state, "WID-007", 10, 1).await;

    let err = state
        .item_service
        .create_item(CreateItemInput {
            sku: "WID-007".to_string(),
            name: "Duplicate".to_string(),
            description: None,
            category: None,
            unit_of_measure: "ea".to_string(),
            current_stock: 0,
            min_stock_level: 0,
            unit_cost: rust_decimal::Decimal::ZERO,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn item_update_routes_stock_change_through_the_ledger() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-008", 100, 10).await;

    let updated = state
        .item_service
        .update_item(
            item.id,
            UpdateItemInput {
                name: Some("Renamed".to_string()),
                current_stock: Some(120),
                ..Default::default()
            },
            "editor",
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.current_stock, 120);

    let history = state.stock_ledger.history(Some(item.id)).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].quantity_change, 20);
    assert_eq!(history[0].adjustment_type, AdjustmentType::Adjustment);
    assert_eq!(history[0].reason, "manual stock adjustment via item update");
    assert_eq!(history[0].created_by, "editor");
}

#[tokio::test]
async fn item_update_with_unchanged_stock_writes_no_row() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-009", 100, 10).await;

    state
        .item_service
        .update_item(
            item.id,
            UpdateItemInput {
                current_stock: Some(100),
                min_stock_level: Some(15),
                ..Default::default()
            },
            "editor",
        )
        .await
        .unwrap();

    let history = state.stock_ledger.history(Some(item.id)).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn item_update_cannot_drive_stock_negative() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-010", 10, 1).await;

    let err = state
        .item_service
        .update_item(
            item.id,
            UpdateItemInput {
                name: Some("Should not stick".to_string()),
                current_stock: Some(-5),
                ..Default::default()
            },
            "editor",
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    // The whole update rolls back, including the unrelated field change.
    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 10);
    assert_eq!(reloaded.name, "Test item WID-010");
}

#[tokio::test]
async fn low_stock_respects_the_multiplier() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-011", 5, 10).await;

    let hits = state.item_service.low_stock(1.0).await.unwrap();
    assert!(hits.iter().any(|i| i.id == item.id));

    // 5 > 10 * 0.4 = 4, so the item is no longer low.
    let hits = state.item_service.low_stock(0.4).await.unwrap();
    assert!(!hits.iter().any(|i| i.id == item.id));
}

#[tokio::test]
async fn zero_min_level_item_is_low_only_when_empty() {
    let state = common::test_state().await;
    let stocked = common::seed_item(&state, "WID-012", 3, 0).await;
    let empty = common::seed_item(&state, "WID-013", 0, 0).await;

    let hits = state.item_service.low_stock(1.0).await.unwrap();
    assert!(!hits.iter().any(|i| i.id == stocked.id));
    assert!(hits.iter().any(|i| i.id == empty.id));
}

#[tokio::test]
async fn inactive_items_are_excluded_from_low_stock() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "WID-014", 0, 10).await;

    state
        .item_service
        .update_item(
            item.id,
            UpdateItemInput {
                is_active: Some(false),
                ..Default::default()
            },
            "editor",
        )
        .await
        .unwrap();

    let hits = state.item_service.low_stock(1.0).await.unwrap();
    assert!(!hits.iter().any(|i| i.id == item.id));
}
