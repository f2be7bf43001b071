use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Categories of stock mutations recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "consumed")]
    Consumed,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "lost")]
    Lost,
}

impl AdjustmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentType::Adjustment => "adjustment",
            AdjustmentType::Received => "received",
            AdjustmentType::Consumed => "consumed",
            AdjustmentType::Damaged => "damaged",
            AdjustmentType::Lost => "lost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "adjustment" => Some(AdjustmentType::Adjustment),
            "received" => Some(AdjustmentType::Received),
            "consumed" => Some(AdjustmentType::Consumed),
            "damaged" => Some(AdjustmentType::Damaged),
            "lost" => Some(AdjustmentType::Lost),
            _ => None,
        }
    }
}

impl std::fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger entry. Rows are inserted exactly once per accepted
/// stock mutation and are never updated or deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_adjustments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub item_id: i64,
    pub adjustment_type: AdjustmentType,
    /// Signed delta; positive increases stock.
    pub quantity_change: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub reason: String,
    /// Loose pointer to the originating document, if any. Never dereferenced
    /// or validated by the ledger itself.
    pub reference_id: Option<i64>,
    pub reference_type: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
