mod common;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use shopfloor_api::{
    entities::stock_adjustment::AdjustmentType,
    errors::ServiceError,
    services::stock_ledger::AdjustmentRequest,
};

fn request(item_id: i64, delta: i32) -> AdjustmentRequest {
    AdjustmentRequest {
        item_id,
        adjustment_type: AdjustmentType::Adjustment,
        quantity_change: delta,
        reason: "property check".to_string(),
        created_by: "prop".to_string(),
        reference: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Whatever sequence of adjustments arrives, stock never goes negative
    /// and every committed row balances against the item's final stock.
    #[test]
    fn ledger_conserves_stock_over_random_deltas(
        initial in 0i32..200,
        deltas in prop::collection::vec(-60i32..=60, 1..12),
    ) {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async move {
            let state = common::test_state().await;
            let item = common::seed_item(&state, "PROP-001", initial, 5).await;

            let mut expected = initial;
            for delta in deltas {
                match state.stock_ledger.apply(request(item.id, delta)).await {
                    Ok(row) => {
                        prop_assert_eq!(row.previous_stock, expected);
                        expected += delta;
                        prop_assert_eq!(row.new_stock, expected);
                        prop_assert!(row.new_stock >= 0);
                    }
                    Err(ServiceError::InvalidOperation(_)) => {
                        prop_assert!(expected + delta < 0, "only shortfalls may be rejected");
                    }
                    Err(other) => return Err(TestCaseError::fail(format!("unexpected error: {other}"))),
                }
            }

            let final_item = state.item_service.get_item(item.id).await.map_err(|e| {
                TestCaseError::fail(format!("reload failed: {e}"))
            })?;
            prop_assert_eq!(final_item.current_stock, expected);

            // Conservation: initial stock plus the sum of committed deltas
            // equals the final stock, with no gaps between adjacent rows.
            let history = state.stock_ledger.history(Some(item.id)).await.map_err(|e| {
                TestCaseError::fail(format!("history failed: {e}"))
            })?;
            let total: i32 = history.iter().map(|r| r.quantity_change).sum();
            prop_assert_eq!(initial + total, final_item.current_stock);
            for row in &history {
                prop_assert_eq!(row.previous_stock + row.quantity_change, row.new_stock);
            }
            Ok(())
        })?;
    }
}
