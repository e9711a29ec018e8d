//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod amazon_order;
pub mod ebay_order;
pub mod enums;
pub mod payout;
pub mod payout_allocation;

// Re-export specific types to avoid conflicts
pub use amazon_order::{
    Column as AmazonOrderColumn, Entity as AmazonOrder, Model as AmazonOrderModel,
};
pub use ebay_order::{Column as EbayOrderColumn, Entity as EbayOrder, Model as EbayOrderModel};
pub use enums::{Platform, RefundType};
pub use payout::{Column as PayoutColumn, Entity as Payout, Model as PayoutModel};
pub use payout_allocation::{
    Column as PayoutAllocationColumn, Entity as PayoutAllocation,
    Model as PayoutAllocationModel,
};
