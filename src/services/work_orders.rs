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
        stock_adjustment::AdjustmentType,
        work_order::{self, Entity as WorkOrder, WorkOrderPriority, WorkOrderStatus},
        work_order_item::{self, Entity as WorkOrderItem},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::numbering::NumberingService,
    services::stock_ledger::{AdjustmentReference, AdjustmentRequest, ReferenceKind, StockLedgerService},
};

#[derive(Debug, Clone)]
pub struct WorkOrderLineInput {
    pub item_id: i64,
    pub quantity_planned: i32,
}

#[derive(Debug, Clone)]
pub struct CreateWorkOrderInput {
    pub title: String,
    pub description: Option<String>,
    pub priority: WorkOrderPriority,
    pub assigned_to: Option<String>,
    pub estimated_hours: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub lines: Vec<WorkOrderLineInput>,
}

/// Partial update; `None` leaves a field unchanged. A `status` of
/// `Completed` routes through the same consumption logic as the dedicated
/// completion call.
#[derive(Debug, Clone, Default)]
pub struct UpdateWorkOrderInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<WorkOrderPriority>,
    pub assigned_to: Option<String>,
    pub estimated_hours: Option<Decimal>,
    pub actual_hours: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<WorkOrderStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkOrderDetails {
    pub work_order: work_order::Model,
    pub lines: Vec<work_order_item::Model>,
}

/// Orchestrates the work order lifecycle. Completion consumes material
/// through the stock ledger inside one transaction; a mid-way shortfall
/// rolls back every adjustment already staged in the same call.
#[derive(Clone)]
pub struct WorkOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    numbering: Arc<dyn NumberingService>,
}

impl WorkOrderService {
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

    #[instrument(skip(self, input), fields(title = %input.title), err)]
    pub async fn create_work_order(
        &self,
        input: CreateWorkOrderInput,
        actor: &str,
    ) -> Result<WorkOrderDetails, ServiceError> {
        let txn = self.db_pool.begin().await?;

        for line in &input.lines {
            if line.quantity_planned <= 0 {
                return Err(ServiceError::ValidationError(
                    "quantity_planned must be positive".to_string(),
                ));
            }
            Item::find_by_id(line.item_id).one(&txn).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("Item with ID {} not found", line.item_id))
            })?;
        }

        let now = Utc::now();
        let created = work_order::ActiveModel {
            number: Set(self.numbering.next_work_order_number()),
            title: Set(input.title),
            description: Set(input.description),
            status: Set(WorkOrderStatus::Created),
            priority: Set(input.priority),
            assigned_to: Set(input.assigned_to),
            estimated_hours: Set(input.estimated_hours),
            actual_hours: Set(None),
            due_date: Set(input.due_date),
            completed_date: Set(None),
            created_by: Set(actor.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in input.lines {
            let saved = work_order_item::ActiveModel {
                work_order_id: Set(created.id),
                item_id: Set(line.item_id),
                quantity_planned: Set(line.quantity_planned),
                quantity_used: Set(0),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            lines.push(saved);
        }

        txn.commit().await?;

        info!(work_order_id = created.id, number = %created.number, "work order created");
        self.event_sender
            .send(Event::WorkOrderCreated(created.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(WorkOrderDetails {
            work_order: created,
            lines,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn get_work_order(&self, id: i64) -> Result<WorkOrderDetails, ServiceError> {
        let db = self.db_pool.as_ref();
        let work_order = WorkOrder::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Work order with ID {} not found", id)))?;
        let lines = WorkOrderItem::find()
            .filter(work_order_item::Column::WorkOrderId.eq(id))
            .order_by_asc(work_order_item::Column::Id)
            .all(db)
            .await?;
        Ok(WorkOrderDetails { work_order, lines })
    }

    #[instrument(skip(self), err)]
    pub async fn list_work_orders(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<work_order::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();
        let total = WorkOrder::find().count(db).await?;
        let work_orders = WorkOrder::find()
            .order_by_desc(work_order::Column::CreatedAt)
            .offset(page.saturating_sub(1) * page_size)
            .limit(page_size)
            .all(db)
            .await?;
        Ok((work_orders, total))
    }

    /// Created -> InProgress.
    #[instrument(skip(self), err)]
    pub async fn start_work_order(&self, id: i64) -> Result<work_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let work_order = Self::load_for_update(&txn, id).await?;

        if work_order.status != WorkOrderStatus::Created {
            return Err(ServiceError::InvalidState(format!(
                "Work order {} cannot be started from status '{}'",
                work_order.number, work_order.status
            )));
        }

        let mut active: work_order::ActiveModel = work_order.into();
        active.status = Set(WorkOrderStatus::InProgress);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send(Event::WorkOrderStarted(id))
            .await
            .map_err(ServiceError::EventError)?;
        Ok(updated)
    }

    /// Any non-terminal state -> Cancelled. No inventory effect.
    #[instrument(skip(self), err)]
    pub async fn cancel_work_order(&self, id: i64) -> Result<work_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let work_order = Self::load_for_update(&txn, id).await?;
        Self::guard_open(&work_order)?;

        let mut active: work_order::ActiveModel = work_order.into();
        active.status = Set(WorkOrderStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send(Event::WorkOrderCancelled(id))
            .await
            .map_err(ServiceError::EventError)?;
        Ok(updated)
    }

    /// Sets a line's `quantity_used` ahead of completion.
    #[instrument(skip(self), err)]
    pub async fn record_usage(
        &self,
        work_order_id: i64,
        line_id: i64,
        quantity_used: i32,
    ) -> Result<work_order_item::Model, ServiceError> {
        if quantity_used < 0 {
            return Err(ServiceError::ValidationError(
                "quantity_used must not be negative".to_string(),
            ));
        }

        let txn = self.db_pool.begin().await?;
        let work_order = Self::load_for_update(&txn, work_order_id).await?;
        Self::guard_open(&work_order)?;

        let line = WorkOrderItem::find_by_id(line_id)
            .filter(work_order_item::Column::WorkOrderId.eq(work_order_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Line {} not found on work order {}",
                    line_id, work_order.number
                ))
            })?;

        let mut active: work_order_item::ActiveModel = line.into();
        active.quantity_used = Set(quantity_used);
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Dedicated completion entry point.
    #[instrument(skip(self), err)]
    pub async fn complete_work_order(
        &self,
        id: i64,
        actual_hours: Option<Decimal>,
        actor: &str,
    ) -> Result<work_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let work_order = Self::load_for_update(&txn, id).await?;
        let completed = Self::complete_in_txn(&txn, work_order, actual_hours, actor).await?;
        txn.commit().await?;

        self.event_sender
            .send(Event::WorkOrderCompleted(id))
            .await
            .map_err(ServiceError::EventError)?;
        Ok(completed)
    }

    /// Generic update entry point. A status change to Completed triggers the
    /// identical consumption logic as [`complete_work_order`]; it is the same
    /// state transition reached through a second door.
    #[instrument(skip(self, changes), err)]
    pub async fn update_work_order(
        &self,
        id: i64,
        changes: UpdateWorkOrderInput,
        actor: &str,
    ) -> Result<work_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let work_order = Self::load_for_update(&txn, id).await?;

        // Terminal orders reject any update, including a repeated status
        // write; a second Completed target surfaces as AlreadyCompleted here.
        Self::guard_open(&work_order)?;

        // Same-status targets on open orders are no-ops.
        let target_status = changes.status.filter(|s| *s != work_order.status);

        let mut active: work_order::ActiveModel = work_order.clone().into();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(priority) = changes.priority {
            active.priority = Set(priority);
        }
        if let Some(assigned_to) = changes.assigned_to {
            active.assigned_to = Set(Some(assigned_to));
        }
        if let Some(estimated) = changes.estimated_hours {
            active.estimated_hours = Set(Some(estimated));
        }
        if let Some(actual) = changes.actual_hours {
            active.actual_hours = Set(Some(actual));
        }
        if let Some(due) = changes.due_date {
            active.due_date = Set(Some(due));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        let result = match target_status {
            None => updated,
            Some(WorkOrderStatus::Completed) => {
                let completed =
                    Self::complete_in_txn(&txn, updated, changes.actual_hours, actor).await?;
                txn.commit().await?;
                self.event_sender
                    .send(Event::WorkOrderCompleted(id))
                    .await
                    .map_err(ServiceError::EventError)?;
                return Ok(completed);
            }
            Some(WorkOrderStatus::Cancelled) => {
                let mut active: work_order::ActiveModel = updated.into();
                active.status = Set(WorkOrderStatus::Cancelled);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?
            }
            Some(WorkOrderStatus::InProgress) => {
                if updated.status != WorkOrderStatus::Created {
                    return Err(ServiceError::InvalidState(format!(
                        "Work order {} cannot move to 'in_progress' from '{}'",
                        updated.number, updated.status
                    )));
                }
                let mut active: work_order::ActiveModel = updated.into();
                active.status = Set(WorkOrderStatus::InProgress);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?
            }
            Some(WorkOrderStatus::Created) => {
                return Err(ServiceError::InvalidState(format!(
                    "Work order {} cannot move back to 'created'",
                    updated.number
                )));
            }
        };

        txn.commit().await?;
        Ok(result)
    }

    /// The single completion implementation shared by both entry points.
    /// Consumes every line with `quantity_used > 0` through the ledger, then
    /// marks the order completed. Runs entirely inside the caller's
    /// transaction.
    async fn complete_in_txn(
        txn: &DatabaseTransaction,
        work_order: work_order::Model,
        actual_hours: Option<Decimal>,
        actor: &str,
    ) -> Result<work_order::Model, ServiceError> {
        match work_order.status {
            WorkOrderStatus::Completed => {
                return Err(ServiceError::AlreadyCompleted(format!(
                    "Work order {} is already completed",
                    work_order.number
                )));
            }
            WorkOrderStatus::Cancelled => {
                return Err(ServiceError::InvalidState(format!(
                    "Work order {} is cancelled and cannot be completed",
                    work_order.number
                )));
            }
            WorkOrderStatus::Created | WorkOrderStatus::InProgress => {}
        }

        let lines = WorkOrderItem::find()
            .filter(work_order_item::Column::WorkOrderId.eq(work_order.id))
            .order_by_asc(work_order_item::Column::Id)
            .all(txn)
            .await?;

        for line in lines.iter().filter(|l| l.quantity_used > 0) {
            let applied = StockLedgerService::apply_in_txn(
                txn,
                AdjustmentRequest {
                    item_id: line.item_id,
                    adjustment_type: AdjustmentType::Consumed,
                    quantity_change: -line.quantity_used,
                    reason: format!("Consumed in work order {}", work_order.number),
                    created_by: actor.to_string(),
                    reference: Some(AdjustmentReference {
                        id: work_order.id,
                        kind: ReferenceKind::WorkOrder,
                    }),
                },
            )
            .await;

            if let Err(ServiceError::InvalidOperation(_)) = applied {
                // The ledger rejected before writing anything, so the
                // transaction is still usable for the item lookup.
                let item_name = Item::find_by_id(line.item_id)
                    .one(txn)
                    .await?
                    .map(|i| i.name)
                    .unwrap_or_else(|| format!("#{}", line.item_id));
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for item {}",
                    item_name
                )));
            }
            applied?;
        }

        let number = work_order.number.clone();
        let mut active: work_order::ActiveModel = work_order.into();
        active.status = Set(WorkOrderStatus::Completed);
        if actual_hours.is_some() {
            active.actual_hours = Set(actual_hours);
        }
        active.completed_date = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        let completed = active.update(txn).await?;

        info!(number = %number, "work order completed");
        Ok(completed)
    }

    async fn load_for_update(
        txn: &DatabaseTransaction,
        id: i64,
    ) -> Result<work_order::Model, ServiceError> {
        WorkOrder::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Work order with ID {} not found", id)))
    }

    fn guard_open(work_order: &work_order::Model) -> Result<(), ServiceError> {
        match work_order.status {
            WorkOrderStatus::Completed => Err(ServiceError::AlreadyCompleted(format!(
                "Work order {} is already completed",
                work_order.number
            ))),
            WorkOrderStatus::Cancelled => Err(ServiceError::InvalidState(format!(
                "Work order {} is cancelled",
                work_order.number
            ))),
            _ => Ok(()),
        }
    }
}
