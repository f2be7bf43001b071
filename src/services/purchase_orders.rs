use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    db::DbPool,
    entities::{
        item::Entity as Item,
        purchase_order::{self, Entity as PurchaseOrder, PurchaseOrderStatus},
        purchase_order_item::{self, Entity as PurchaseOrderItem},
        stock_adjustment::AdjustmentType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::numbering::NumberingService,
    services::stock_ledger::{AdjustmentReference, AdjustmentRequest, ReferenceKind, StockLedgerService},
};

#[derive(Debug, Clone)]
pub struct PurchaseOrderLineInput {
    pub item_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct CreatePurchaseOrderInput {
    pub supplier_id: i64,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub lines: Vec<PurchaseOrderLineInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetails {
    pub purchase_order: purchase_order::Model,
    pub lines: Vec<purchase_order_item::Model>,
}

/// Orchestrates the purchase order lifecycle. The transition to Received
/// books the unreceived remainder of every line into stock through the
/// ledger, in one transaction with the status change.
#[derive(Clone)]
pub struct PurchaseOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    numbering: Arc<dyn NumberingService>,
}

impl PurchaseOrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        numbering: Arc<dyn NumberingService>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            numbering,
        }
    }

    #[instrument(skip(self, input), fields(supplier_id = input.supplier_id), err)]
    pub async fn create_purchase_order(
        &self,
        input: CreatePurchaseOrderInput,
        actor: &str,
    ) -> Result<PurchaseOrderDetails, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "a purchase order needs at least one line".to_string(),
            ));
        }

        let txn = self.db_pool.begin().await?;

        let mut total_amount = Decimal::ZERO;
        for line in &input.lines {
            if line.quantity <= 0 {
                return Err(ServiceError::ValidationError(
                    "quantity must be positive".to_string(),
                ));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "unit_price must not be negative".to_string(),
                ));
            }
            Item::find_by_id(line.item_id).one(&txn).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("Item with ID {} not found", line.item_id))
            })?;
            total_amount += line.unit_price * Decimal::from(line.quantity);
        }

        let now = Utc::now();
        let created = purchase_order::ActiveModel {
            number: Set(self.numbering.next_purchase_order_number()),
            supplier_id: Set(input.supplier_id),
            status: Set(PurchaseOrderStatus::Draft),
            total_amount: Set(total_amount),
            expected_delivery_date: Set(input.expected_delivery_date),
            notes: Set(input.notes),
            created_by: Set(actor.to_string()),
            approved_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in input.lines {
            let saved = purchase_order_item::ActiveModel {
                purchase_order_id: Set(created.id),
                item_id: Set(line.item_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.unit_price * Decimal::from(line.quantity)),
                received_quantity: Set(0),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            lines.push(saved);
        }

        txn.commit().await?;

        info!(purchase_order_id = created.id, number = %created.number, "purchase order created");
        self.event_sender
            .send(Event::PurchaseOrderCreated(created.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(PurchaseOrderDetails {
            purchase_order: created,
            lines,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn get_purchase_order(&self, id: i64) -> Result<PurchaseOrderDetails, ServiceError> {
        let db = self.db_pool.as_ref();
        let purchase_order = PurchaseOrder::find_by_id(id).one(db).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Purchase order with ID {} not found", id))
        })?;
        let lines = PurchaseOrderItem::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(id))
            .order_by_asc(purchase_order_item::Column::Id)
            .all(db)
            .await?;
        Ok(PurchaseOrderDetails {
            purchase_order,
            lines,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn list_purchase_orders(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<purchase_order::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();
        let total = PurchaseOrder::find().count(db).await?;
        let orders = PurchaseOrder::find()
            .order_by_desc(purchase_order::Column::CreatedAt)
            .offset(page.saturating_sub(1) * page_size)
            .limit(page_size)
            .all(db)
            .await?;
        Ok((orders, total))
    }

    /// Moves an order along Draft -> Pending -> Approved -> Ordered ->
    /// Received, or to Cancelled from any open state. Approved records the
    /// approver; Received triggers the receiving workflow. Re-triggering
    /// Received on an already-received order is a safe no-op for inventory.
    #[instrument(skip(self), err)]
    pub async fn transition_status(
        &self,
        id: i64,
        new_status: PurchaseOrderStatus,
        actor: &str,
    ) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let order = PurchaseOrder::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order with ID {} not found", id))
            })?;

        let old_status = order.status;
        let allowed = match new_status {
            PurchaseOrderStatus::Cancelled => !old_status.is_terminal(),
            // Re-triggering Received is permitted; every line is already
            // fully received, so the receiving pass changes nothing.
            PurchaseOrderStatus::Received => {
                old_status.next_in_pipeline() == Some(new_status)
                    || old_status == PurchaseOrderStatus::Received
            }
            _ => old_status.next_in_pipeline() == Some(new_status),
        };
        if !allowed {
            return Err(ServiceError::InvalidState(format!(
                "Purchase order {} cannot move from '{}' to '{}'",
                order.number, old_status, new_status
            )));
        }

        if new_status == PurchaseOrderStatus::Received {
            self.receive_in_txn(&txn, &order, actor).await?;
        }

        let number = order.number.clone();
        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(new_status);
        if new_status == PurchaseOrderStatus::Approved {
            active.approved_by = Set(Some(actor.to_string()));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(number = %number, from = %old_status, to = %new_status, "purchase order status changed");
        self.event_sender
            .send(Event::PurchaseOrderStatusChanged {
                purchase_order_id: id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)?;
        if new_status == PurchaseOrderStatus::Received {
            self.event_sender
                .send(Event::PurchaseOrderReceived(id))
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(updated)
    }

    /// Books the unreceived remainder of every line into stock. Full-receipt
    /// model: one Received transition reconciles everything outstanding;
    /// lines already fully received are skipped.
    async fn receive_in_txn(
        &self,
        txn: &DatabaseTransaction,
        order: &purchase_order::Model,
        actor: &str,
    ) -> Result<(), ServiceError> {
        let lines = PurchaseOrderItem::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
            .order_by_asc(purchase_order_item::Column::Id)
            .all(txn)
            .await?;

        for line in lines {
            let remaining = line.quantity - line.received_quantity;
            if remaining <= 0 {
                continue;
            }

            StockLedgerService::apply_in_txn(
                txn,
                AdjustmentRequest {
                    item_id: line.item_id,
                    adjustment_type: AdjustmentType::Received,
                    quantity_change: remaining,
                    reason: format!("Items received from Purchase Order {}", order.number),
                    created_by: actor.to_string(),
                    reference: Some(AdjustmentReference {
                        id: order.id,
                        kind: ReferenceKind::PurchaseOrder,
                    }),
                },
            )
            .await?;

            let quantity = line.quantity;
            let mut active: purchase_order_item::ActiveModel = line.into();
            active.received_quantity = Set(quantity);
            active.update(txn).await?;
        }

        Ok(())
    }
}
