//! eBay order entity - One row per eBay sale.
//!
//! eBay reports seller-side fees on the order itself, so the derived amounts come
//! in two steps: `net_amount` (subtotal less eBay fees) and `total_amount`
//! (net plus pass-through shipping and tax).

use super::enums::RefundType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// eBay order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ebay_orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Marketplace order number (e.g., "12-34567-89012")
    #[sea_orm(unique)]
    pub order_number: String,
    /// When the order was placed
    pub order_date: DateTimeUtc,
    /// Number of items sold
    pub order_quantity: i32,
    /// Item subtotal before fees
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub item_subtotal: Decimal,
    /// Shipping and handling charged to the buyer
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub shipping_handling: Decimal,
    /// Tax collected on the order
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub tax_collected: Decimal,
    /// Final value fee charged by eBay
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub transaction_fee: Decimal,
    /// Promoted listing fees
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub ad_fees: Decimal,
    /// `item_subtotal - transaction_fee - ad_fees`
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub net_amount: Decimal,
    /// `net_amount + shipping_handling + tax_collected`
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_amount: Decimal,
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

/// eBay orders are referenced from payout allocations by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
