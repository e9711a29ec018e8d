//! Order total calculation - pure functions, one per marketplace.
//!
//! Every write path that stores an order goes through these functions, so the
//! derived amounts can always be reproduced from the stored fee components.

use super::fields::{checked_add, checked_sub, round_cents};
use crate::{
    entities::{amazon_order, ebay_order},
    errors::Result,
};
use rust_decimal::Decimal;

const FIELD_ORDER_TOTAL: &str = "orderTotal";
const FIELD_NET_AMOUNT: &str = "netAmount";
const FIELD_TOTAL_AMOUNT: &str = "totalAmount";

/// Fee components of an Amazon order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmazonFees {
    /// Item subtotal
    pub subtotal: Decimal,
    /// Additional fee charged to the buyer
    pub additional_fee: Decimal,
    /// Shipping and handling
    pub shipping_handling: Decimal,
    /// Tax collected
    pub tax_collected: Decimal,
    /// Portion paid with a gift card, subtracted from the total
    pub gift_card_amount: Decimal,
}

impl From<&amazon_order::Model> for AmazonFees {
    fn from(order: &amazon_order::Model) -> Self {
        Self {
            subtotal: order.subtotal,
            additional_fee: order.additional_fee,
            shipping_handling: order.shipping_handling,
            tax_collected: order.tax_collected,
            gift_card_amount: order.gift_card_amount,
        }
    }
}

/// Fee components of an eBay order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EbayFees {
    /// Item subtotal
    pub item_subtotal: Decimal,
    /// Shipping and handling
    pub shipping_handling: Decimal,
    /// Tax collected
    pub tax_collected: Decimal,
    /// Final value fee
    pub transaction_fee: Decimal,
    /// Promoted listing fees
    pub ad_fees: Decimal,
}

impl From<&ebay_order::Model> for EbayFees {
    fn from(order: &ebay_order::Model) -> Self {
        Self {
            item_subtotal: order.item_subtotal,
            shipping_handling: order.shipping_handling,
            tax_collected: order.tax_collected,
            transaction_fee: order.transaction_fee,
            ad_fees: order.ad_fees,
        }
    }
}

/// Derived amounts of an eBay order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EbayAmounts {
    /// Subtotal less eBay fees
    pub net_amount: Decimal,
    /// Net plus shipping and tax; the amount a payout settles
    pub total_amount: Decimal,
}

/// `subtotal + additional_fee + shipping_handling + tax_collected - gift_card_amount`
///
/// # Errors
/// Returns `Error::AmountOverflow` if an intermediate sum does not fit a `Decimal`.
pub fn amazon_order_total(fees: &AmazonFees) -> Result<Decimal> {
    let mut total = checked_add(FIELD_ORDER_TOTAL, fees.subtotal, fees.additional_fee)?;
    total = checked_add(FIELD_ORDER_TOTAL, total, fees.shipping_handling)?;
    total = checked_add(FIELD_ORDER_TOTAL, total, fees.tax_collected)?;
    total = checked_sub(FIELD_ORDER_TOTAL, total, fees.gift_card_amount)?;
    Ok(round_cents(total))
}

/// `net = item_subtotal - transaction_fee - ad_fees`, `total = net + shipping_handling + tax_collected`
///
/// # Errors
/// Returns `Error::AmountOverflow` if an intermediate sum does not fit a `Decimal`.
pub fn ebay_amounts(fees: &EbayFees) -> Result<EbayAmounts> {
    let net = checked_sub(FIELD_NET_AMOUNT, fees.item_subtotal, fees.transaction_fee)?;
    let net_amount = round_cents(checked_sub(FIELD_NET_AMOUNT, net, fees.ad_fees)?);
    let total = checked_add(FIELD_TOTAL_AMOUNT, net_amount, fees.shipping_handling)?;
    let total_amount = round_cents(checked_add(FIELD_TOTAL_AMOUNT, total, fees.tax_collected)?);
    Ok(EbayAmounts {
        net_amount,
        total_amount,
    })
}

/// Whether the stored total of an Amazon order still matches its fee components.
#[must_use]
pub fn amazon_total_matches(order: &amazon_order::Model) -> bool {
    amazon_order_total(&AmazonFees::from(order))
        .is_ok_and(|total| total == round_cents(order.order_total))
}

/// Whether the stored amounts of an eBay order still match its fee components.
#[must_use]
pub fn ebay_amounts_match(order: &ebay_order::Model) -> bool {
    ebay_amounts(&EbayFees::from(order)).is_ok_and(|expected| {
        expected.net_amount == round_cents(order.net_amount)
            && expected.total_amount == round_cents(order.total_amount)
    })
}
