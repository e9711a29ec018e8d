//! Amazon order entity - One row per Amazon Seller Central order.
//!
//! Fee inputs are stored as entered; `order_total` is derived from them by
//! `core::calculator::amazon_order_total` on every write. `remaining_amount` and
//! `is_paid` track how much of the total is still waiting on a payout.

use super::enums::RefundType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Amazon order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "amazon_orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Marketplace order number (e.g., "112-0000000-0000000")
    #[sea_orm(unique)]
    pub order_number: String,
    /// When the order was placed
    pub order_date: DateTimeUtc,
    /// Number of items in the order
    pub number_of_items: i32,
    /// Payment method reported by the marketplace, if any
    pub payment_method: Option<String>,
    /// Item subtotal before fees and tax
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub subtotal: Decimal,
    /// Additional fee charged to the buyer
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub additional_fee: Decimal,
    /// Shipping and handling charged to the buyer
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub shipping_handling: Decimal,
    /// Tax collected on the order
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub tax_collected: Decimal,
    /// Portion paid with a gift card
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub gift_card_amount: Decimal,
    /// Derived order total
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub order_total: Decimal,
    /// Kind of the outstanding refund, if any
    pub refund_type: Option<RefundType>,
    /// Amount of the outstanding refund, if any
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub refund_amount: Option<Decimal>,
    /// Part of the total not yet settled by a payout
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub remaining_amount: Decimal,
    /// True once `remaining_amount` reaches zero
    pub is_paid: bool,
    /// Optimistic-concurrency counter, bumped on every payment-state write
    pub version: i32,
    /// When the order was recorded
    pub created_at: DateTimeUtc,
    /// When the order was last modified
    pub updated_at: DateTimeUtc,
}

/// Amazon orders are referenced from payout allocations by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
