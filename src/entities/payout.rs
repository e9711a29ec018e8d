//! Payout entity - A settlement event that pays down one or more orders.
//!
//! `amount` always equals the sum of the payout's allocation rows; it is written
//! once when the payout is created and never edited afterwards.

use super::enums::Platform;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payout database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payouts")]
pub struct Model {
    /// Unique identifier for the payout
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Marketplace whose orders this payout settles
    pub platform: Platform,
    /// When the funds were received
    pub date: DateTimeUtc,
    /// Total paid out, equal to the sum of allocations
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    /// How the funds arrived (e.g., "Direct Deposit", "PayPal")
    pub method: String,
    /// Free-form note
    pub description: Option<String>,
    /// When the payout was recorded
    pub created_at: DateTimeUtc,
    /// When the payout was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Payout and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One payout has many allocations
    #[sea_orm(has_many = "super::payout_allocation::Entity")]
    Allocations,
}

impl Related<super::payout_allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
