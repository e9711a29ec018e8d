//! Remaining-balance tracking for orders of either marketplace.
//!
//! Payouts only ever touch an order through this module. Each write is
//! conditional on the `version` read in the same transaction, so a balance can't
//! be consumed twice by two overlapping payouts: the slower writer matches zero
//! rows and gets `Error::ConcurrentModification`.

use crate::{
    entities::{AmazonOrder, EbayOrder, Platform, amazon_order, ebay_order},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{prelude::*, sea_query::Expr};
use tracing::{debug, instrument};

/// Payment-relevant view of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentState {
    /// Order this state belongs to
    pub order_id: i64,
    /// Amount a payout can settle in total
    pub total: Decimal,
    /// Amount still waiting on a payout
    pub remaining_amount: Decimal,
    /// Version the state was read at
    pub version: i32,
}

impl PaymentState {
    /// Amount already settled by payouts.
    #[must_use]
    pub fn already_paid(&self) -> Decimal {
        self.total - self.remaining_amount
    }
}

/// Reads the payment state of an order, `None` if it does not exist.
pub async fn load_payment_state<C>(
    db: &C,
    platform: Platform,
    order_id: i64,
) -> Result<Option<PaymentState>>
where
    C: ConnectionTrait,
{
    let state = match platform {
        Platform::Amazon => AmazonOrder::find_by_id(order_id)
            .one(db)
            .await?
            .map(|order| PaymentState {
                order_id,
                total: order.order_total,
                remaining_amount: order.remaining_amount,
                version: order.version,
            }),
        Platform::Ebay => EbayOrder::find_by_id(order_id)
            .one(db)
            .await?
            .map(|order| PaymentState {
                order_id,
                total: order.total_amount,
                remaining_amount: order.remaining_amount,
                version: order.version,
            }),
    };
    Ok(state)
}

/// Writes a new remaining amount, flips `is_paid` accordingly and bumps the version.
///
/// Fails with `Error::ConcurrentModification` when the order changed since `state`
/// was read.
#[instrument(skip(db))]
pub async fn write_remaining_amount<C>(
    db: &C,
    platform: Platform,
    state: &PaymentState,
    new_remaining: Decimal,
) -> Result<PaymentState>
where
    C: ConnectionTrait,
{
    let is_paid = new_remaining.is_zero();
    let now = Utc::now();

    let rows_affected = match platform {
        Platform::Amazon => {
            AmazonOrder::update_many()
                .col_expr(
                    amazon_order::Column::RemainingAmount,
                    Expr::value(new_remaining),
                )
                .col_expr(amazon_order::Column::IsPaid, Expr::value(is_paid))
                .col_expr(
                    amazon_order::Column::Version,
                    Expr::col(amazon_order::Column::Version).add(1),
                )
                .col_expr(amazon_order::Column::UpdatedAt, Expr::value(now))
                .filter(amazon_order::Column::Id.eq(state.order_id))
                .filter(amazon_order::Column::Version.eq(state.version))
                .exec(db)
                .await?
                .rows_affected
        }
        Platform::Ebay => {
            EbayOrder::update_many()
                .col_expr(
                    ebay_order::Column::RemainingAmount,
                    Expr::value(new_remaining),
                )
                .col_expr(ebay_order::Column::IsPaid, Expr::value(is_paid))
                .col_expr(
                    ebay_order::Column::Version,
                    Expr::col(ebay_order::Column::Version).add(1),
                )
                .col_expr(ebay_order::Column::UpdatedAt, Expr::value(now))
                .filter(ebay_order::Column::Id.eq(state.order_id))
                .filter(ebay_order::Column::Version.eq(state.version))
                .exec(db)
                .await?
                .rows_affected
        }
    };

    if rows_affected == 0 {
        return Err(Error::ConcurrentModification {
            platform,
            order_id: state.order_id,
        });
    }

    debug!(
        "{} order {}: remaining {} -> {} (paid={})",
        platform, state.order_id, state.remaining_amount, new_remaining, is_paid
    );
    Ok(PaymentState {
        remaining_amount: new_remaining,
        version: state.version + 1,
        ..*state
    })
}

/// Checks that `amount` can be paid toward the order described by `state` and
/// returns the remaining amount after it.
///
/// # Errors
/// * `Error::InvalidAmount` - `amount` is zero or negative
/// * `Error::AllocationExceedsRemaining` - `amount` is more than the order still owes
pub fn remaining_after(state: &PaymentState, amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount {
            field: "allocation amount",
            amount,
        });
    }
    if amount > state.remaining_amount {
        return Err(Error::AllocationExceedsRemaining {
            order_id: state.order_id,
            requested: amount,
            remaining: state.remaining_amount,
        });
    }
    Ok(state.remaining_amount - amount)
}

/// Applies `amount` of a payout to an order.
///
/// # Errors
/// * `Error::InvalidAmount` - `amount` is zero or negative
/// * `Error::UnknownAllocationOrder` - the order does not exist
/// * `Error::AllocationExceedsRemaining` - `amount` is more than the order still owes
/// * `Error::ConcurrentModification` - the order changed underneath us
pub async fn allocate_to_order<C>(
    db: &C,
    platform: Platform,
    order_id: i64,
    amount: Decimal,
) -> Result<PaymentState>
where
    C: ConnectionTrait,
{
    let state = load_payment_state(db, platform, order_id)
        .await?
        .ok_or(Error::UnknownAllocationOrder { platform, order_id })?;
    let new_remaining = remaining_after(&state, amount)?;
    write_remaining_amount(db, platform, &state, new_remaining).await
}

/// Gives `amount` back to an order, never raising it above the order total.
///
/// Returns `None` when the order no longer exists.
pub async fn restore_to_order<C>(
    db: &C,
    platform: Platform,
    order_id: i64,
    amount: Decimal,
) -> Result<Option<PaymentState>>
where
    C: ConnectionTrait,
{
    let Some(state) = load_payment_state(db, platform, order_id).await? else {
        return Ok(None);
    };
    let restored = (state.remaining_amount + amount).min(state.total);
    write_remaining_amount(db, platform, &state, restored)
        .await
        .map(Some)
}
