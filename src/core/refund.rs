//! Refund adjustment - records at most one outstanding refund on an order.
//!
//! A refund is bookkeeping on the order itself. It never reverses a payout and
//! never touches `remaining_amount`.

use super::{
    fields::parse_optional_amount,
    order::{Order, get_order},
};
use crate::{
    entities::{AmazonOrder, EbayOrder, Platform, RefundType, amazon_order, ebay_order},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{prelude::*, sea_query::Expr};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{info, instrument, warn};

/// Refund form as submitted by the presentation layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RefundFields {
    /// FULL, PARTIAL, SHIPPING or TAX, any case
    #[serde(rename = "type")]
    pub refund_type: Option<String>,
    /// Refunded amount; a FULL refund may leave it blank
    pub amount: Option<String>,
}

/// A refund that passed validation against a specific order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRefund {
    /// Parsed refund type
    pub refund_type: RefundType,
    /// Amount within `0 < amount <= total`
    pub amount: Decimal,
}

/// Checks a refund form against the total of the order it targets.
///
/// A FULL refund defaults to the whole order total and must equal it.
///
/// # Errors
/// * `Error::MissingField` - no type, or no amount for a non-FULL refund
/// * `Error::InvalidField` - unknown type or non-numeric amount
/// * `Error::InvalidRefund` - amount outside `0 < amount <= total`, or a FULL
///   refund that is not the whole total
pub fn validate_refund(fields: &RefundFields, order_total: Decimal) -> Result<ValidatedRefund> {
    let raw_type = fields
        .refund_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingField { field: "type" })?;
    let refund_type = RefundType::from_str(raw_type).map_err(|reason| Error::InvalidField {
        field: "type",
        value: raw_type.to_string(),
        reason,
    })?;

    let amount = match (
        refund_type,
        parse_optional_amount("amount", fields.amount.as_deref())?,
    ) {
        (_, Some(amount)) => amount,
        (RefundType::Full, None) => order_total,
        (_, None) => return Err(Error::MissingField { field: "amount" }),
    };

    if amount <= Decimal::ZERO {
        return Err(Error::InvalidRefund {
            amount,
            order_total,
            reason: "amount must be positive".to_string(),
        });
    }
    if amount > order_total {
        return Err(Error::InvalidRefund {
            amount,
            order_total,
            reason: "amount exceeds the order total".to_string(),
        });
    }
    if refund_type == RefundType::Full && amount != order_total {
        return Err(Error::InvalidRefund {
            amount,
            order_total,
            reason: "a full refund must cover the whole order total".to_string(),
        });
    }

    Ok(ValidatedRefund {
        refund_type,
        amount,
    })
}

/// Writes a validated refund, conditional on the order still being at
/// `read_version` and carrying no refund.
///
/// # Errors
/// * `Error::RefundAlreadyRecorded` - a refund landed since the order was read
/// * `Error::ConcurrentModification` - the order changed in some other way
/// * `Error::OrderNotFound` - the order was deleted
async fn write_refund<C>(
    db: &C,
    platform: Platform,
    order_id: i64,
    read_version: i32,
    refund: &ValidatedRefund,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let rows_affected = match platform {
        Platform::Amazon => {
            AmazonOrder::update_many()
                .col_expr(
                    amazon_order::Column::RefundType,
                    Expr::value(refund.refund_type.as_str()),
                )
                .col_expr(
                    amazon_order::Column::RefundAmount,
                    Expr::value(refund.amount),
                )
                .col_expr(
                    amazon_order::Column::Version,
                    Expr::col(amazon_order::Column::Version).add(1),
                )
                .col_expr(amazon_order::Column::UpdatedAt, Expr::value(now))
                .filter(amazon_order::Column::Id.eq(order_id))
                .filter(amazon_order::Column::Version.eq(read_version))
                .filter(amazon_order::Column::RefundType.is_null())
                .exec(db)
                .await?
                .rows_affected
        }
        Platform::Ebay => {
            EbayOrder::update_many()
                .col_expr(
                    ebay_order::Column::RefundType,
                    Expr::value(refund.refund_type.as_str()),
                )
                .col_expr(ebay_order::Column::RefundAmount, Expr::value(refund.amount))
                .col_expr(
                    ebay_order::Column::Version,
                    Expr::col(ebay_order::Column::Version).add(1),
                )
                .col_expr(ebay_order::Column::UpdatedAt, Expr::value(now))
                .filter(ebay_order::Column::Id.eq(order_id))
                .filter(ebay_order::Column::Version.eq(read_version))
                .filter(ebay_order::Column::RefundType.is_null())
                .exec(db)
                .await?
                .rows_affected
        }
    };
    if rows_affected > 0 {
        return Ok(());
    }

    let refund_present = match platform {
        Platform::Amazon => AmazonOrder::find_by_id(order_id)
            .one(db)
            .await?
            .map(|o| o.refund_type.is_some()),
        Platform::Ebay => EbayOrder::find_by_id(order_id)
            .one(db)
            .await?
            .map(|o| o.refund_type.is_some()),
    };
    match refund_present {
        Some(true) => Err(Error::RefundAlreadyRecorded { platform, order_id }),
        Some(false) => Err(Error::ConcurrentModification { platform, order_id }),
        None => Err(Error::OrderNotFound { platform, order_id }),
    }
}

/// Records a refund on an order.
///
/// The amount is checked against the total that was read, and the write only
/// lands if the order is still at that version, so neither a second refund nor
/// a lowered total can slip in between.
///
/// # Errors
/// * `Error::OrderNotFound` - the order does not exist
/// * `Error::RefundAlreadyRecorded` - the order already carries a refund
/// * `Error::ConcurrentModification` - the order changed while the refund was applied
/// * any validation error from [`validate_refund`]
#[instrument(skip(db, fields))]
pub async fn apply_refund(
    db: &DatabaseConnection,
    platform: Platform,
    order_id: i64,
    fields: &RefundFields,
) -> Result<Order> {
    let order = get_order(db, platform, order_id)
        .await?
        .ok_or(Error::OrderNotFound { platform, order_id })?;
    if order.refund().is_some() {
        warn!("{} order {} already carries a refund", platform, order_id);
        return Err(Error::RefundAlreadyRecorded { platform, order_id });
    }

    let refund = validate_refund(fields, order.total())?;
    write_refund(
        db,
        platform,
        order_id,
        order.payment_state().version,
        &refund,
    )
    .await?;

    info!(
        "Recorded {} refund of {} on {} order {}",
        refund.refund_type, refund.amount, platform, order_id
    );
    get_order(db, platform, order_id)
        .await?
        .ok_or(Error::OrderNotFound { platform, order_id })
}

/// Removes the outstanding refund from an order. Clearing an order without a
/// refund is a no-op.
///
/// # Errors
/// Returns `Error::OrderNotFound` if the order does not exist.
#[instrument(skip(db))]
pub async fn clear_refund(
    db: &DatabaseConnection,
    platform: Platform,
    order_id: i64,
) -> Result<Order> {
    let order = get_order(db, platform, order_id)
        .await?
        .ok_or(Error::OrderNotFound { platform, order_id })?;
    if order.refund().is_none() {
        return Ok(order);
    }

    let now = Utc::now();
    match platform {
        Platform::Amazon => {
            AmazonOrder::update_many()
                .col_expr(
                    amazon_order::Column::RefundType,
                    Expr::value(Option::<String>::None),
                )
                .col_expr(
                    amazon_order::Column::RefundAmount,
                    Expr::value(Option::<Decimal>::None),
                )
                .col_expr(
                    amazon_order::Column::Version,
                    Expr::col(amazon_order::Column::Version).add(1),
                )
                .col_expr(amazon_order::Column::UpdatedAt, Expr::value(now))
                .filter(amazon_order::Column::Id.eq(order_id))
                .exec(db)
                .await?;
        }
        Platform::Ebay => {
            EbayOrder::update_many()
                .col_expr(
                    ebay_order::Column::RefundType,
                    Expr::value(Option::<String>::None),
                )
                .col_expr(
                    ebay_order::Column::RefundAmount,
                    Expr::value(Option::<Decimal>::None),
                )
                .col_expr(
                    ebay_order::Column::Version,
                    Expr::col(ebay_order::Column::Version).add(1),
                )
                .col_expr(ebay_order::Column::UpdatedAt, Expr::value(now))
                .filter(ebay_order::Column::Id.eq(order_id))
                .exec(db)
                .await?;
        }
    }

    info!("Cleared refund on {} order {}", platform, order_id);
    get_order(db, platform, order_id)
        .await?
        .ok_or(Error::OrderNotFound { platform, order_id })
}
