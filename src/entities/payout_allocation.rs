//! Payout allocation entity - The part of a payout applied to a single order.
//!
//! `order_id` points into `amazon_orders` or `ebay_orders` depending on the
//! owning payout's platform, so it carries no foreign key of its own.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payout allocation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payout_allocations")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Payout this allocation belongs to
    pub payout_id: i64,
    /// Order that received the funds
    pub order_id: i64,
    /// Amount applied to the order
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
}

/// Defines relationships between `PayoutAllocation` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each allocation belongs to one payout
    #[sea_orm(
        belongs_to = "super::payout::Entity",
        from = "Column::PayoutId",
        to = "super::payout::Column::Id",
        on_delete = "Cascade"
    )]
    Payout,
}

impl Related<super::payout::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payout.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
