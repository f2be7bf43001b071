use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::{info, instrument};

use crate::{
    db::DbPool,
    entities::{
        item::{self, Entity as Item},
        stock_adjustment::{self, AdjustmentType, Entity as StockAdjustment},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Loose pointer to the document that caused an adjustment. The ledger
/// stores it verbatim and never dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustmentReference {
    pub id: i64,
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    PurchaseOrder,
    WorkOrder,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::PurchaseOrder => "purchase_order",
            ReferenceKind::WorkOrder => "work_order",
        }
    }
}

/// One requested stock mutation.
#[derive(Debug, Clone)]
pub struct AdjustmentRequest {
    pub item_id: i64,
    pub adjustment_type: AdjustmentType,
    pub quantity_change: i32,
    pub reason: String,
    pub created_by: String,
    pub reference: Option<AdjustmentReference>,
}

/// The stock-mutation core. Every change to an item's `current_stock`
/// funnels through [`StockLedgerService::apply`] (or [`apply_in_txn`]
/// when a workflow composes several mutations into one transaction), which
/// validates the delta, updates the item, and writes the immutable audit
/// row as a single atomic unit.
#[derive(Clone)]
pub struct StockLedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockLedgerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Validates and applies a single stock adjustment in its own
    /// transaction, returning the created ledger row.
    #[instrument(skip(self, request), fields(item_id = request.item_id), err)]
    pub async fn apply(
        &self,
        request: AdjustmentRequest,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let adjustment = Self::apply_in_txn(&txn, request).await?;
        txn.commit().await?;

        self.event_sender
            .send(Event::StockAdjusted {
                item_id: adjustment.item_id,
                adjustment_type: adjustment.adjustment_type,
                quantity_change: adjustment.quantity_change,
                new_stock: adjustment.new_stock,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(adjustment)
    }

    /// The read-validate-write core, composable into a caller-owned
    /// transaction. The item row is read with an exclusive lock so two
    /// concurrent adjustments to the same item cannot both observe the same
    /// `previous_stock`.
    pub async fn apply_in_txn(
        txn: &DatabaseTransaction,
        request: AdjustmentRequest,
    ) -> Result<stock_adjustment::Model, ServiceError> {
        let item = Item::find_by_id(request.item_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Item with ID {} not found", request.item_id))
            })?;

        let previous_stock = item.current_stock;
        let new_stock = previous_stock
            .checked_add(request.quantity_change)
            .ok_or_else(|| {
                ServiceError::InvalidOperation(format!(
                    "Adjustment of {} to item {} overflows the stock counter",
                    request.quantity_change, item.sku
                ))
            })?;
        if new_stock < 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Adjustment of {} to item {} would result in negative stock ({} available)",
                request.quantity_change, item.sku, previous_stock
            )));
        }

        let adjustment = stock_adjustment::ActiveModel {
            item_id: Set(request.item_id),
            adjustment_type: Set(request.adjustment_type),
            quantity_change: Set(request.quantity_change),
            previous_stock: Set(previous_stock),
            new_stock: Set(new_stock),
            reason: Set(request.reason),
            reference_id: Set(request.reference.map(|r| r.id)),
            reference_type: Set(request.reference.map(|r| r.kind.as_str().to_string())),
            created_by: Set(request.created_by),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        let mut active_item: item::ActiveModel = item.into();
        active_item.current_stock = Set(new_stock);
        active_item.updated_at = Set(Utc::now());
        active_item.update(txn).await?;

        info!(
            item_id = request.item_id,
            adjustment_type = %adjustment.adjustment_type,
            quantity_change = adjustment.quantity_change,
            previous_stock,
            new_stock,
            "stock adjustment applied"
        );

        Ok(adjustment)
    }

    /// Adjustment history, newest first, optionally filtered to one item.
    /// Read-only; the ledger has no update or delete path.
    #[instrument(skip(self), err)]
    pub async fn history(
        &self,
        item_id: Option<i64>,
    ) -> Result<Vec<stock_adjustment::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockAdjustment::find()
            .order_by_desc(stock_adjustment::Column::CreatedAt)
            .order_by_desc(stock_adjustment::Column::Id);
        if let Some(item_id) = item_id {
            query = query.filter(stock_adjustment::Column::ItemId.eq(item_id));
        }

        Ok(query.all(db).await?)
    }
}
