mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use shopfloor_api::{
    entities::stock_adjustment::AdjustmentType,
    entities::work_order::{WorkOrderPriority, WorkOrderStatus},
    errors::ServiceError,
    services::work_orders::{CreateWorkOrderInput, UpdateWorkOrderInput, WorkOrderLineInput},
    AppState,
};

async fn seed_work_order(
    state: &AppState,
    lines: Vec<WorkOrderLineInput>,
) -> shopfloor_api::services::work_orders::WorkOrderDetails {
    state
        .work_order_service
        .create_work_order(
            CreateWorkOrderInput {
                title: "Assemble widgets".to_string(),
                description: None,
                priority: WorkOrderPriority::Normal,
                assigned_to: Some("alex".to_string()),
                estimated_hours: Some(dec!(4.0)),
                due_date: None,
                lines,
            },
            "planner",
        )
        .await
        .expect("work order should be created")
}

#[tokio::test]
async fn completion_consumes_used_quantities() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "PART-001", 100, 10).await;
    let details = seed_work_order(
        &state,
        vec![WorkOrderLineInput {
            item_id: item.id,
            quantity_planned: 20,
        }],
    )
    .await;
    let wo = details.work_order;

    state.work_order_service.start_work_order(wo.id).await.unwrap();
    state
        .work_order_service
        .record_usage(wo.id, details.lines[0].id, 15)
        .await
        .unwrap();

    let completed = state
        .work_order_service
        .complete_work_order(wo.id, Some(dec!(3.5)), "operator")
        .await
        .unwrap();

    assert_eq!(completed.status, WorkOrderStatus::Completed);
    assert_eq!(completed.actual_hours, Some(dec!(3.5)));
    assert!(completed.completed_date.is_some());

    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 85);

    let history = state.stock_ledger.history(Some(item.id)).await.unwrap();
    assert_eq!(history.len(), 1);
    let row = &history[0];
    assert_eq!(row.adjustment_type, AdjustmentType::Consumed);
    assert_eq!(row.quantity_change, -15);
    assert_eq!(row.previous_stock, 100);
    assert_eq!(row.new_stock, 85);
    assert_eq!(row.reason, format!("Consumed in work order {}", wo.number));
    assert_eq!(row.reference_id, Some(wo.id));
    assert_eq!(row.reference_type.as_deref(), Some("work_order"));
    assert_eq!(row.created_by, "operator");
}

#[tokio::test]
async fn second_completion_is_rejected_without_double_consumption() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "PART-002", 50, 5).await;
    let details = seed_work_order(
        &state,
        vec![WorkOrderLineInput {
            item_id: item.id,
            quantity_planned: 10,
        }],
    )
    .await;
    let wo = details.work_order;

    state
        .work_order_service
        .record_usage(wo.id, details.lines[0].id, 10)
        .await
        .unwrap();
    state
        .work_order_service
        .complete_work_order(wo.id, None, "operator")
        .await
        .unwrap();

    let err = state
        .work_order_service
        .complete_work_order(wo.id, None, "operator")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::AlreadyCompleted(_));

    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 40);
    let history = state.stock_ledger.history(Some(item.id)).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn shortfall_rolls_back_every_line() {
    let state = common::test_state().await;
    let plenty = common::seed_item(&state, "PART-003", 100, 10).await;
    let scarce = common::seed_item(&state, "PART-004", 3, 1).await;
    let details = seed_work_order(
        &state,
        vec![
            WorkOrderLineInput {
                item_id: plenty.id,
                quantity_planned: 10,
            },
            WorkOrderLineInput {
                item_id: scarce.id,
                quantity_planned: 10,
            },
        ],
    )
    .await;
    let wo = details.work_order;

    state
        .work_order_service
        .record_usage(wo.id, details.lines[0].id, 10)
        .await
        .unwrap();
    state
        .work_order_service
        .record_usage(wo.id, details.lines[1].id, 10)
        .await
        .unwrap();

    let err = state
        .work_order_service
        .complete_work_order(wo.id, None, "operator")
        .await
        .unwrap_err();
    match err {
        ServiceError::InsufficientStock(msg) => {
            assert!(msg.contains(&scarce.name), "message names the item: {msg}");
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // The first line's consumption must have been rolled back too.
    let reloaded = state.item_service.get_item(plenty.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 100);
    assert!(state
        .stock_ledger
        .history(Some(plenty.id))
        .await
        .unwrap()
        .is_empty());

    let wo_after = state.work_order_service.get_work_order(wo.id).await.unwrap();
    assert_ne!(wo_after.work_order.status, WorkOrderStatus::Completed);
}

#[tokio::test]
async fn cancelled_work_order_cannot_be_completed() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "PART-005", 20, 2).await;
    let details = seed_work_order(
        &state,
        vec![WorkOrderLineInput {
            item_id: item.id,
            quantity_planned: 5,
        }],
    )
    .await;
    let wo = details.work_order;

    state.work_order_service.cancel_work_order(wo.id).await.unwrap();

    let err = state
        .work_order_service
        .complete_work_order(wo.id, None, "operator")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn completion_with_no_usage_touches_no_stock() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "PART-006", 20, 2).await;
    let details = seed_work_order(
        &state,
        vec![WorkOrderLineInput {
            item_id: item.id,
            quantity_planned: 5,
        }],
    )
    .await;

    // quantity_used stays 0 on the line; nothing is consumed.
    let completed = state
        .work_order_service
        .complete_work_order(details.work_order.id, None, "operator")
        .await
        .unwrap();
    assert_eq!(completed.status, WorkOrderStatus::Completed);

    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 20);
    assert!(state
        .stock_ledger
        .history(Some(item.id))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn generic_update_to_completed_consumes_like_the_dedicated_call() {
    let state = common::test_state().await;
    let item = common::seed_item(&state, "PART-007", 30, 3).await;
    let details = seed_work_order(
        &state,
        vec![WorkOrderLineInput {
            item_id: item.id,
            quantity_planned: 8,
        }],
    )
    .await;
    let wo = details.work_order;

    state
        .work_order_service
        .record_usage(wo.id, details.lines[0].id, 8)
        .await
        .unwrap();

    let completed = state
        .work_order_service
        .update_work_order(
            wo.id,
            UpdateWorkOrderInput {
                status: Some(WorkOrderStatus::Completed),
                actual_hours: Some(dec!(2.0)),
                ..Default::default()
            },
            "operator",
        )
        .await
        .unwrap();
    assert_eq!(completed.status, WorkOrderStatus::Completed);

    let reloaded = state.item_service.get_item(item.id).await.unwrap();
    assert_eq!(reloaded.current_stock, 22);

    // A second update to completed hits the same guard as the dedicated call.
    let err = state
        .work_order_service
        .update_work_order(
            wo.id,
            UpdateWorkOrderInput {
                status: Some(WorkOrderStatus::Completed),
                ..Default::default()
            },
            "operator",
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::AlreadyCompleted(_));
}

#[tokio::test]
async fn lifecycle_transitions_are_guarded() {
    let state = common::test_state().await;
    let details = seed_work_order(&state, vec![]).await;
    let wo = details.work_order;

    state.work_order_service.start_work_order(wo.id).await.unwrap();

    // Starting twice is invalid.
    let err = state
        .work_order_service
        .start_work_order(wo.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    // Moving back to created is invalid.
    let err = state
        .work_order_service
        .update_work_order(
            wo.id,
            UpdateWorkOrderInput {
                status: Some(WorkOrderStatus::Created),
                ..Default::default()
            },
            "planner",
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    state.work_order_service.cancel_work_order(wo.id).await.unwrap();

    // Edits after cancellation are rejected.
    let err = state
        .work_order_service
        .update_work_order(
            wo.id,
            UpdateWorkOrderInput {
                title: Some("Too late".to_string()),
                ..Default::default()
            },
            "planner",
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn repeating_a_terminal_status_does_not_touch_the_order() {
    let state = common::test_state().await;
    let details = seed_work_order(&state, vec![]).await;
    let wo = details.work_order;

    let cancelled = state.work_order_service.cancel_work_order(wo.id).await.unwrap();

    let err = state
        .work_order_service
        .update_work_order(
            wo.id,
            UpdateWorkOrderInput {
                status: Some(WorkOrderStatus::Cancelled),
                ..Default::default()
            },
            "planner",
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    // Even updated_at stays as the cancellation left it.
    let after = state.work_order_service.get_work_order(wo.id).await.unwrap();
    assert_eq!(after.work_order.updated_at, cancelled.updated_at);
}

#[tokio::test]
async fn create_rejects_unknown_items_and_bad_quantities() {
    let state = common::test_state().await;

    let err = state
        .work_order_service
        .create_work_order(
            CreateWorkOrderInput {
                title: "Ghost parts".to_string(),
                description: None,
                priority: WorkOrderPriority::Low,
                assigned_to: None,
                estimated_hours: None,
                due_date: None,
                lines: vec![WorkOrderLineInput {
                    item_id: 9999,
                    quantity_planned: 1,
                }],
            },
            "planner",
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let item = common::seed_item(&state, "PART-008", 10, 1).await;
    let err = state
        .work_order_service
        .create_work_order(
            CreateWorkOrderInput {
                title: "Zero line".to_string(),
                description: None,
                priority: WorkOrderPriority::Low,
                assigned_to: None,
                estimated_hours: None,
                due_date: None,
                lines: vec![WorkOrderLineInput {
                    item_id: item.id,
                    quantity_planned: 0,
                }],
            },
            "planner",
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
