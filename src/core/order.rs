//! Order business logic - Handles creating, updating, deleting and listing orders.
//!
//! Both marketplaces share one entry point per operation. Form input is validated
//! and the derived totals are recomputed with `core::calculator` on every create
//! and update, so a stored total can never drift from its fee components. An
//! update keeps whatever payouts already settled: the new remaining amount is the
//! new total minus what has been paid so far.

use super::{
    balance::PaymentState,
    calculator::{AmazonFees, EbayFees, amazon_order_total, ebay_amounts},
    fields::{
        ensure_storable, parse_date, parse_fee, parse_optional_text, parse_quantity,
        parse_required_text,
    },
};
use crate::{
    entities::{AmazonOrder, EbayOrder, Platform, RefundType, amazon_order, ebay_order},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, SqlErr, prelude::*};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

/// Amazon order form as submitted by the presentation layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmazonOrderFields {
    /// Marketplace order number, required
    pub order_number: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339, required
    pub order_date: Option<String>,
    /// Item count, blank means zero
    pub number_of_items: Option<String>,
    /// Free text
    pub payment_method: Option<String>,
    /// Item subtotal
    pub subtotal: Option<String>,
    /// Additional fee charged to the buyer
    pub additional_fee: Option<String>,
    /// Shipping and handling
    pub shipping_handling: Option<String>,
    /// Tax collected
    pub tax_collected: Option<String>,
    /// Portion paid with a gift card
    pub gift_card_amount: Option<String>,
}

/// eBay order form as submitted by the presentation layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EbayOrderFields {
    /// Marketplace order number, required
    pub order_number: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339, required
    pub order_date: Option<String>,
    /// Item count, blank means zero
    pub order_quantity: Option<String>,
    /// Item subtotal
    pub item_subtotal: Option<String>,
    /// Shipping and handling
    pub shipping_handling: Option<String>,
    /// Tax collected
    pub tax_collected: Option<String>,
    /// Final value fee
    pub transaction_fee: Option<String>,
    /// Promoted listing fees
    pub ad_fees: Option<String>,
}

/// Order form for either marketplace.
#[derive(Debug, Clone)]
pub enum OrderFields {
    /// Amazon form
    Amazon(AmazonOrderFields),
    /// eBay form
    Ebay(EbayOrderFields),
}

impl OrderFields {
    /// Marketplace the form belongs to.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        match self {
            Self::Amazon(_) => Platform::Amazon,
            Self::Ebay(_) => Platform::Ebay,
        }
    }
}

/// A stored order of either marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    /// Row of `amazon_orders`
    Amazon(amazon_order::Model),
    /// Row of `ebay_orders`
    Ebay(ebay_order::Model),
}

impl Order {
    /// Marketplace the order was placed on.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        match self {
            Self::Amazon(_) => Platform::Amazon,
            Self::Ebay(_) => Platform::Ebay,
        }
    }

    /// Row id within the platform's table.
    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Amazon(o) => o.id,
            Self::Ebay(o) => o.id,
        }
    }

    /// Marketplace order number.
    #[must_use]
    pub fn order_number(&self) -> &str {
        match self {
            Self::Amazon(o) => &o.order_number,
            Self::Ebay(o) => &o.order_number,
        }
    }

    /// When the order was placed.
    #[must_use]
    pub const fn order_date(&self) -> DateTime<Utc> {
        match self {
            Self::Amazon(o) => o.order_date,
            Self::Ebay(o) => o.order_date,
        }
    }

    /// The amount payouts settle: `order_total` on Amazon, `total_amount` on eBay.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        match self {
            Self::Amazon(o) => o.order_total,
            Self::Ebay(o) => o.total_amount,
        }
    }

    /// Part of the total still waiting on a payout.
    #[must_use]
    pub const fn remaining_amount(&self) -> Decimal {
        match self {
            Self::Amazon(o) => o.remaining_amount,
            Self::Ebay(o) => o.remaining_amount,
        }
    }

    /// True once nothing remains to be paid.
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        match self {
            Self::Amazon(o) => o.is_paid,
            Self::Ebay(o) => o.is_paid,
        }
    }

    /// Outstanding refund type and amount, if a refund is recorded.
    #[must_use]
    pub const fn refund(&self) -> Option<(RefundType, Option<Decimal>)> {
        let (refund_type, refund_amount) = match self {
            Self::Amazon(o) => (o.refund_type, o.refund_amount),
            Self::Ebay(o) => (o.refund_type, o.refund_amount),
        };
        match refund_type {
            Some(t) => Some((t, refund_amount)),
            None => None,
        }
    }

    /// Payment-relevant view used for version-guarded writes.
    #[must_use]
    pub const fn payment_state(&self) -> PaymentState {
        match self {
            Self::Amazon(o) => PaymentState {
                order_id: o.id,
                total: o.order_total,
                remaining_amount: o.remaining_amount,
                version: o.version,
            },
            Self::Ebay(o) => PaymentState {
                order_id: o.id,
                total: o.total_amount,
                remaining_amount: o.remaining_amount,
                version: o.version,
            },
        }
    }
}

struct ValidatedAmazonOrder {
    order_number: String,
    order_date: DateTime<Utc>,
    number_of_items: i32,
    payment_method: Option<String>,
    fees: AmazonFees,
    order_total: Decimal,
}

struct ValidatedEbayOrder {
    order_number: String,
    order_date: DateTime<Utc>,
    order_quantity: i32,
    fees: EbayFees,
    net_amount: Decimal,
    total_amount: Decimal,
}

fn validate_amazon_fields(fields: &AmazonOrderFields) -> Result<ValidatedAmazonOrder> {
    let order_number = parse_required_text("orderNumber", fields.order_number.as_deref())?;
    let order_date = parse_date("orderDate", fields.order_date.as_deref())?;
    let number_of_items = parse_quantity("numberOfItems", fields.number_of_items.as_deref())?;
    let fees = AmazonFees {
        subtotal: parse_fee("subtotal", fields.subtotal.as_deref())?,
        additional_fee: parse_fee("additionalFee", fields.additional_fee.as_deref())?,
        shipping_handling: parse_fee("shippingHandling", fields.shipping_handling.as_deref())?,
        tax_collected: parse_fee("taxCollected", fields.tax_collected.as_deref())?,
        gift_card_amount: parse_fee("giftCardAmount", fields.gift_card_amount.as_deref())?,
    };

    let order_total = ensure_storable("orderTotal", amazon_order_total(&fees)?)?;
    if order_total.is_sign_negative() && !order_total.is_zero() {
        return Err(Error::InvalidAmount {
            field: "orderTotal",
            amount: order_total,
        });
    }

    Ok(ValidatedAmazonOrder {
        order_number,
        order_date,
        number_of_items,
        payment_method: parse_optional_text(fields.payment_method.as_deref()),
        fees,
        order_total,
    })
}

fn validate_ebay_fields(fields: &EbayOrderFields) -> Result<ValidatedEbayOrder> {
    let order_number = parse_required_text("orderNumber", fields.order_number.as_deref())?;
    let order_date = parse_date("orderDate", fields.order_date.as_deref())?;
    let order_quantity = parse_quantity("orderQuantity", fields.order_quantity.as_deref())?;
    let fees = EbayFees {
        item_subtotal: parse_fee("itemSubtotal", fields.item_subtotal.as_deref())?,
        shipping_handling: parse_fee("shippingHandling", fields.shipping_handling.as_deref())?,
        tax_collected: parse_fee("taxCollected", fields.tax_collected.as_deref())?,
        transaction_fee: parse_fee("transactionFee", fields.transaction_fee.as_deref())?,
        ad_fees: parse_fee("adFees", fields.ad_fees.as_deref())?,
    };

    let amounts = ebay_amounts(&fees)?;
    ensure_storable("netAmount", amounts.net_amount)?;
    ensure_storable("totalAmount", amounts.total_amount)?;
    if amounts.total_amount.is_sign_negative() && !amounts.total_amount.is_zero() {
        return Err(Error::InvalidAmount {
            field: "totalAmount",
            amount: amounts.total_amount,
        });
    }

    Ok(ValidatedEbayOrder {
        order_number,
        order_date,
        order_quantity,
        fees,
        net_amount: amounts.net_amount,
        total_amount: amounts.total_amount,
    })
}

/// Turns a unique-constraint violation on insert/update into a duplicate order number.
fn map_unique_violation(err: DbErr, platform: Platform, order_number: &str) -> Error {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        Error::DuplicateOrderNumber {
            platform,
            order_number: order_number.to_string(),
        }
    } else {
        Error::Database(err)
    }
}

/// Remaining amount after the total of a partly paid order changes.
///
/// Whatever payouts already settled stays settled.
///
/// # Errors
/// Returns `Error::TotalBelowPaid` when the new total is less than what was paid.
pub fn rebalance_remaining(state: &PaymentState, new_total: Decimal) -> Result<Decimal> {
    let already_paid = state.already_paid();
    if new_total < already_paid {
        return Err(Error::TotalBelowPaid {
            new_total,
            already_paid,
        });
    }
    Ok(new_total - already_paid)
}

/// Keeps a recorded refund consistent with a changed total: a FULL refund follows
/// the total, any other refund must still fit inside it.
fn rebalance_refund(
    refund_type: Option<RefundType>,
    refund_amount: Option<Decimal>,
    new_total: Decimal,
) -> Result<Option<Decimal>> {
    match (refund_type, refund_amount) {
        (Some(RefundType::Full), amount) if new_total <= Decimal::ZERO => {
            Err(Error::InvalidRefund {
                amount: amount.unwrap_or_default(),
                order_total: new_total,
                reason: "a full refund cannot follow the order total down to zero".to_string(),
            })
        }
        (Some(RefundType::Full), _) => Ok(Some(new_total)),
        (Some(_), Some(amount)) if amount > new_total => Err(Error::InvalidRefund {
            amount,
            order_total: new_total,
            reason: "existing refund exceeds the new order total".to_string(),
        }),
        (_, amount) => Ok(amount),
    }
}

async fn order_number_taken(
    db: &DatabaseConnection,
    platform: Platform,
    order_number: &str,
    except_id: Option<i64>,
) -> Result<bool> {
    let existing_id = match platform {
        Platform::Amazon => AmazonOrder::find()
            .filter(amazon_order::Column::OrderNumber.eq(order_number))
            .one(db)
            .await?
            .map(|o| o.id),
        Platform::Ebay => EbayOrder::find()
            .filter(ebay_order::Column::OrderNumber.eq(order_number))
            .one(db)
            .await?
            .map(|o| o.id),
    };
    Ok(existing_id.is_some_and(|id| Some(id) != except_id))
}

/// Creates an order from a submitted form.
///
/// The new order starts fully unpaid: `remaining_amount` equals its total.
///
/// # Errors
/// * `Error::MissingField`, `Error::InvalidField`, `Error::InvalidAmount` - bad form input
/// * `Error::DuplicateOrderNumber` - the order number is already recorded for the platform
#[instrument(skip(db, fields), fields(platform = %fields.platform()))]
pub async fn create_order(db: &DatabaseConnection, fields: &OrderFields) -> Result<Order> {
    let now = Utc::now();
    let order = match fields {
        OrderFields::Amazon(form) => {
            let valid = validate_amazon_fields(form)?;
            if order_number_taken(db, Platform::Amazon, &valid.order_number, None).await? {
                warn!("Rejected duplicate Amazon order {}", valid.order_number);
                return Err(Error::DuplicateOrderNumber {
                    platform: Platform::Amazon,
                    order_number: valid.order_number,
                });
            }

            let model = amazon_order::ActiveModel {
                order_number: Set(valid.order_number.clone()),
                order_date: Set(valid.order_date),
                number_of_items: Set(valid.number_of_items),
                payment_method: Set(valid.payment_method),
                subtotal: Set(valid.fees.subtotal),
                additional_fee: Set(valid.fees.additional_fee),
                shipping_handling: Set(valid.fees.shipping_handling),
                tax_collected: Set(valid.fees.tax_collected),
                gift_card_amount: Set(valid.fees.gift_card_amount),
                order_total: Set(valid.order_total),
                refund_type: Set(None),
                refund_amount: Set(None),
                remaining_amount: Set(valid.order_total),
                is_paid: Set(valid.order_total.is_zero()),
                version: Set(0),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            let inserted = model
                .insert(db)
                .await
                .map_err(|e| map_unique_violation(e, Platform::Amazon, &valid.order_number))?;
            Order::Amazon(inserted)
        }
        OrderFields::Ebay(form) => {
            let valid = validate_ebay_fields(form)?;
            if order_number_taken(db, Platform::Ebay, &valid.order_number, None).await? {
                warn!("Rejected duplicate eBay order {}", valid.order_number);
                return Err(Error::DuplicateOrderNumber {
                    platform: Platform::Ebay,
                    order_number: valid.order_number,
                });
            }

            let model = ebay_order::ActiveModel {
                order_number: Set(valid.order_number.clone()),
                order_date: Set(valid.order_date),
                order_quantity: Set(valid.order_quantity),
                item_subtotal: Set(valid.fees.item_subtotal),
                shipping_handling: Set(valid.fees.shipping_handling),
                tax_collected: Set(valid.fees.tax_collected),
                transaction_fee: Set(valid.fees.transaction_fee),
                ad_fees: Set(valid.fees.ad_fees),
                net_amount: Set(valid.net_amount),
                total_amount: Set(valid.total_amount),
                refund_type: Set(None),
                refund_amount: Set(None),
                remaining_amount: Set(valid.total_amount),
                is_paid: Set(valid.total_amount.is_zero()),
                version: Set(0),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            let inserted = model
                .insert(db)
                .await
                .map_err(|e| map_unique_violation(e, Platform::Ebay, &valid.order_number))?;
            Order::Ebay(inserted)
        }
    };

    info!(
        "Created {} order {} (id={}, total={})",
        order.platform(),
        order.order_number(),
        order.id(),
        order.total()
    );
    Ok(order)
}

/// Replaces the inputs of an existing order and recomputes its derived amounts.
///
/// The write is conditional on the version that was read, so an allocation that
/// lands between the read and the write is never overwritten.
///
/// # Errors
/// * `Error::OrderNotFound` - no order with `order_id` on the form's platform
/// * `Error::MissingField`, `Error::InvalidField`, `Error::InvalidAmount` - bad form input
/// * `Error::TotalBelowPaid` - the new total is less than what payouts already settled
/// * `Error::DuplicateOrderNumber` - the new order number belongs to another order
/// * `Error::ConcurrentModification` - the order changed while being updated
#[instrument(skip(db, fields), fields(platform = %fields.platform()))]
pub async fn update_order(
    db: &DatabaseConnection,
    order_id: i64,
    fields: &OrderFields,
) -> Result<Order> {
    let platform = fields.platform();
    let existing = get_order(db, platform, order_id)
        .await?
        .ok_or(Error::OrderNotFound { platform, order_id })?;
    let state = existing.payment_state();
    let now = Utc::now();

    let rows_affected = match (fields, existing) {
        (OrderFields::Amazon(form), Order::Amazon(current)) => {
            let valid = validate_amazon_fields(form)?;
            if valid.order_number != current.order_number
                && order_number_taken(db, platform, &valid.order_number, Some(order_id)).await?
            {
                return Err(Error::DuplicateOrderNumber {
                    platform,
                    order_number: valid.order_number,
                });
            }
            let remaining = rebalance_remaining(&state, valid.order_total)?;
            let refund_amount =
                rebalance_refund(current.refund_type, current.refund_amount, valid.order_total)?;

            let model = amazon_order::ActiveModel {
                order_number: Set(valid.order_number.clone()),
                order_date: Set(valid.order_date),
                number_of_items: Set(valid.number_of_items),
                payment_method: Set(valid.payment_method),
                subtotal: Set(valid.fees.subtotal),
                additional_fee: Set(valid.fees.additional_fee),
                shipping_handling: Set(valid.fees.shipping_handling),
                tax_collected: Set(valid.fees.tax_collected),
                gift_card_amount: Set(valid.fees.gift_card_amount),
                order_total: Set(valid.order_total),
                refund_amount: Set(refund_amount),
                remaining_amount: Set(remaining),
                is_paid: Set(remaining.is_zero()),
                version: Set(state.version + 1),
                updated_at: Set(now),
                ..Default::default()
            };
            AmazonOrder::update_many()
                .set(model)
                .filter(amazon_order::Column::Id.eq(order_id))
                .filter(amazon_order::Column::Version.eq(state.version))
                .exec(db)
                .await
                .map_err(|e| map_unique_violation(e, platform, &valid.order_number))?
                .rows_affected
        }
        (OrderFields::Ebay(form), Order::Ebay(current)) => {
            let valid = validate_ebay_fields(form)?;
            if valid.order_number != current.order_number
                && order_number_taken(db, platform, &valid.order_number, Some(order_id)).await?
            {
                return Err(Error::DuplicateOrderNumber {
                    platform,
                    order_number: valid.order_number,
                });
            }
            let remaining = rebalance_remaining(&state, valid.total_amount)?;
            let refund_amount =
                rebalance_refund(current.refund_type, current.refund_amount, valid.total_amount)?;

            let model = ebay_order::ActiveModel {
                order_number: Set(valid.order_number.clone()),
                order_date: Set(valid.order_date),
                order_quantity: Set(valid.order_quantity),
                item_subtotal: Set(valid.fees.item_subtotal),
                shipping_handling: Set(valid.fees.shipping_handling),
                tax_collected: Set(valid.fees.tax_collected),
                transaction_fee: Set(valid.fees.transaction_fee),
                ad_fees: Set(valid.fees.ad_fees),
                net_amount: Set(valid.net_amount),
                total_amount: Set(valid.total_amount),
                refund_amount: Set(refund_amount),
                remaining_amount: Set(remaining),
                is_paid: Set(remaining.is_zero()),
                version: Set(state.version + 1),
                updated_at: Set(now),
                ..Default::default()
            };
            EbayOrder::update_many()
                .set(model)
                .filter(ebay_order::Column::Id.eq(order_id))
                .filter(ebay_order::Column::Version.eq(state.version))
                .exec(db)
                .await
                .map_err(|e| map_unique_violation(e, platform, &valid.order_number))?
                .rows_affected
        }
        // get_order looked the order up on the form's own platform
        _ => return Err(Error::OrderNotFound { platform, order_id }),
    };

    if rows_affected == 0 {
        return Err(Error::ConcurrentModification { platform, order_id });
    }

    let updated = get_order(db, platform, order_id)
        .await?
        .ok_or(Error::OrderNotFound { platform, order_id })?;
    info!(
        "Updated {} order {} (total={}, remaining={})",
        platform,
        order_id,
        updated.total(),
        updated.remaining_amount()
    );
    Ok(updated)
}

/// Hard-deletes an order.
///
/// Allocations that payouts made to the order stay on those payouts, so payout
/// amounts keep matching the sum of their allocations.
///
/// # Errors
/// Returns `Error::OrderNotFound` if the order does not exist.
#[instrument(skip(db))]
pub async fn delete_order(db: &DatabaseConnection, platform: Platform, order_id: i64) -> Result<()> {
    let order = get_order(db, platform, order_id)
        .await?
        .ok_or(Error::OrderNotFound { platform, order_id })?;

    let rows_affected = match platform {
        Platform::Amazon => AmazonOrder::delete_by_id(order_id).exec(db).await?.rows_affected,
        Platform::Ebay => EbayOrder::delete_by_id(order_id).exec(db).await?.rows_affected,
    };
    if rows_affected == 0 {
        return Err(Error::OrderNotFound { platform, order_id });
    }

    if order.remaining_amount() < order.total() {
        warn!(
            "Deleted {} order {} that payouts had already settled {} of",
            platform,
            order_id,
            order.total() - order.remaining_amount()
        );
    } else {
        info!("Deleted {} order {}", platform, order_id);
    }
    Ok(())
}

/// Finds an order by its id, `None` if it does not exist.
pub async fn get_order(
    db: &DatabaseConnection,
    platform: Platform,
    order_id: i64,
) -> Result<Option<Order>> {
    let order = match platform {
        Platform::Amazon => AmazonOrder::find_by_id(order_id)
            .one(db)
            .await?
            .map(Order::Amazon),
        Platform::Ebay => EbayOrder::find_by_id(order_id)
            .one(db)
            .await?
            .map(Order::Ebay),
    };
    Ok(order)
}

/// Retrieves every order of a platform, newest order date first.
pub async fn list_orders(db: &DatabaseConnection, platform: Platform) -> Result<Vec<Order>> {
    let orders = match platform {
        Platform::Amazon => AmazonOrder::find()
            .order_by_desc(amazon_order::Column::OrderDate)
            .order_by_desc(amazon_order::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Order::Amazon)
            .collect(),
        Platform::Ebay => EbayOrder::find()
            .order_by_desc(ebay_order::Column::OrderDate)
            .order_by_desc(ebay_order::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Order::Ebay)
            .collect(),
    };
    Ok(orders)
}

/// Retrieves the orders of a platform that still wait on a payout, oldest first,
/// which is the order a seller usually settles them in.
pub async fn list_unpaid_orders(db: &DatabaseConnection, platform: Platform) -> Result<Vec<Order>> {
    let orders: Vec<Order> = match platform {
        Platform::Amazon => AmazonOrder::find()
            .filter(amazon_order::Column::RemainingAmount.gt(Decimal::ZERO))
            .order_by_asc(amazon_order::Column::OrderDate)
            .order_by_asc(amazon_order::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Order::Amazon)
            .collect(),
        Platform::Ebay => EbayOrder::find()
            .filter(ebay_order::Column::RemainingAmount.gt(Decimal::ZERO))
            .order_by_asc(ebay_order::Column::OrderDate)
            .order_by_asc(ebay_order::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Order::Ebay)
            .collect(),
    };
    debug!("{} unpaid {} orders", orders.len(), platform);
    Ok(orders)
}
