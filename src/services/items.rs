use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{info, instrument};

use crate::{
    db::DbPool,
    entities::item::{self, Entity as Item},
    entities::stock_adjustment::AdjustmentType,
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock_ledger::{AdjustmentRequest, StockLedgerService},
};

#[derive(Debug, Clone)]
pub struct CreateItemInput {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_of_measure: String,
    pub current_stock: i32,
    pub min_stock_level: i32,
    pub unit_cost: Decimal,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateItemInput {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_of_measure: Option<String>,
    pub current_stock: Option<i32>,
    pub min_stock_level: Option<i32>,
    pub unit_cost: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Owns the item catalog. A stock value arriving through the generic update
/// path is never written directly; the delta is routed through the ledger so
/// the change stays audited.
#[derive(Clone)]
pub struct ItemService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ItemService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates an item. An item springing into existence with nonzero stock
    /// gets no ledger row; there is no previous state to account for.
    #[instrument(skip(self, input), fields(sku = %input.sku), err)]
    pub async fn create_item(&self, input: CreateItemInput) -> Result<item::Model, ServiceError> {
        if input.current_stock < 0 {
            return Err(ServiceError::ValidationError(
                "current_stock must not be negative".to_string(),
            ));
        }
        if input.min_stock_level < 0 {
            return Err(ServiceError::ValidationError(
                "min_stock_level must not be negative".to_string(),
            ));
        }
        if input.unit_cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit_cost must not be negative".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        Self::ensure_sku_unique(db, &input.sku, None).await?;

        let now = Utc::now();
        let created = item::ActiveModel {
            sku: Set(input.sku),
            name: Set(input.name),
            description: Set(input.description),
            category: Set(input.category),
            unit_of_measure: Set(input.unit_of_measure),
            current_stock: Set(input.current_stock),
            min_stock_level: Set(input.min_stock_level),
            unit_cost: Set(input.unit_cost),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(item_id = created.id, sku = %created.sku, "item created");
        self.event_sender
            .send(Event::ItemCreated(created.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(created)
    }

    #[instrument(skip(self), err)]
    pub async fn get_item(&self, id: i64) -> Result<item::Model, ServiceError> {
        Item::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item with ID {} not found", id)))
    }

    #[instrument(skip(self), err)]
    pub async fn list_items(&self, include_inactive: bool) -> Result<Vec<item::Model>, ServiceError> {
        let mut query = Item::find().order_by_asc(item::Column::Sku);
        if !include_inactive {
            query = query.filter(item::Column::IsActive.eq(true));
        }
        Ok(query.all(self.db_pool.as_ref()).await?)
    }

    /// Applies a partial update. A changed `current_stock` is delegated to
    /// the ledger inside the same transaction as the rest of the field
    /// updates, so even edits from a generic form stay audited.
    #[instrument(skip(self, changes), err)]
    pub async fn update_item(
        &self,
        id: i64,
        changes: UpdateItemInput,
        actor: &str,
    ) -> Result<item::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let existing = Item::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item with ID {} not found", id)))?;

        if let Some(new_sku) = &changes.sku {
            if *new_sku != existing.sku {
                Self::ensure_sku_unique(&txn, new_sku, Some(id)).await?;
            }
        }
        if let Some(level) = changes.min_stock_level {
            if level < 0 {
                return Err(ServiceError::ValidationError(
                    "min_stock_level must not be negative".to_string(),
                ));
            }
        }
        if let Some(cost) = changes.unit_cost {
            if cost < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "unit_cost must not be negative".to_string(),
                ));
            }
        }

        let stock_delta = match changes.current_stock {
            Some(target) => {
                let delta = target.checked_sub(existing.current_stock).ok_or_else(|| {
                    ServiceError::InvalidOperation(format!(
                        "Stock change from {} to {} overflows the stock counter",
                        existing.current_stock, target
                    ))
                })?;
                (delta != 0).then_some(delta)
            }
            None => None,
        };

        let mut active: item::ActiveModel = existing.into();
        if let Some(sku) = changes.sku {
            active.sku = Set(sku);
        }
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(category) = changes.category {
            active.category = Set(Some(category));
        }
        if let Some(unit) = changes.unit_of_measure {
            active.unit_of_measure = Set(unit);
        }
        if let Some(level) = changes.min_stock_level {
            active.min_stock_level = Set(level);
        }
        if let Some(cost) = changes.unit_cost {
            active.unit_cost = Set(cost);
        }
        if let Some(flag) = changes.is_active {
            active.is_active = Set(flag);
        }
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        if let Some(delta) = stock_delta {
            StockLedgerService::apply_in_txn(
                &txn,
                AdjustmentRequest {
                    item_id: id,
                    adjustment_type: AdjustmentType::Adjustment,
                    quantity_change: delta,
                    reason: "manual stock adjustment via item update".to_string(),
                    created_by: actor.to_string(),
                    reference: None,
                },
            )
            .await?;
        }

        let updated = Item::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item with ID {} not found", id)))?;
        txn.commit().await?;

        self.event_sender
            .send(Event::ItemUpdated(id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }

    /// Active items at or below their reorder point, scaled by a fractional
    /// multiplier. An item with `min_stock_level = 0` only qualifies when it
    /// is completely out of stock.
    #[instrument(skip(self), err)]
    pub async fn low_stock(&self, threshold_multiplier: f64) -> Result<Vec<item::Model>, ServiceError> {
        if threshold_multiplier < 0.0 {
            return Err(ServiceError::ValidationError(
                "threshold multiplier must not be negative".to_string(),
            ));
        }

        // Fractional threshold over integer columns; evaluated in memory.
        let items = self.list_items(false).await?;
        Ok(items
            .into_iter()
            .filter(|i| (i.current_stock as f64) <= (i.min_stock_level as f64) * threshold_multiplier)
            .collect())
    }

    async fn ensure_sku_unique<C: sea_orm::ConnectionTrait>(
        db: &C,
        sku: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), ServiceError> {
        let mut query = Item::find().filter(item::Column::Sku.eq(sku));
        if let Some(id) = exclude_id {
            query = query.filter(item::Column::Id.ne(id));
        }
        if query.one(db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "An item with SKU '{}' already exists",
                sku
            )));
        }
        Ok(())
    }
}
