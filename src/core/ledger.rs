//! Combined order and payout timeline for one marketplace, plus a reconciliation
//! snapshot of its balances.

use super::{
    calculator,
    order::{Order, list_orders},
    payout::list_payouts,
};
use crate::{
    entities::{Platform, payout},
    errors::Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::cmp::Reverse;
use tracing::{debug, instrument};

/// One row of the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    /// An order of either marketplace.
    Order(Order),
    /// A payout received from the marketplace.
    Payout(payout::Model),
}

impl LedgerEntry {
    /// Order date for orders, receipt date for payouts.
    #[must_use]
    pub const fn date(&self) -> DateTime<Utc> {
        match self {
            Self::Order(order) => order.order_date(),
            Self::Payout(payout) => payout.date,
        }
    }
}

/// Orders and payouts of a platform merged into one list, newest first.
///
/// Entries on the same date keep orders ahead of payouts.
#[instrument(skip(db))]
pub async fn ledger_entries(
    db: &DatabaseConnection,
    platform: Platform,
) -> Result<Vec<LedgerEntry>> {
    let orders = list_orders(db, platform).await?;
    let payouts = list_payouts(db, Some(platform)).await?;

    let mut entries: Vec<LedgerEntry> = orders
        .into_iter()
        .map(LedgerEntry::Order)
        .chain(payouts.into_iter().map(LedgerEntry::Payout))
        .collect();
    // Calendar day only: times of day do not reorder entries within a date
    entries.sort_by_key(|entry| Reverse(entry.date().date_naive()));

    debug!("{} ledger entries for {}", entries.len(), platform);
    Ok(entries)
}

/// Balance totals of one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSummary {
    /// Marketplace these totals cover
    pub platform: Platform,
    /// Number of orders
    pub order_count: usize,
    /// Orders with a positive remaining amount
    pub unpaid_count: usize,
    /// Sum of order totals
    pub ordered: Decimal,
    /// Sum of payout amounts
    pub paid_out: Decimal,
    /// Sum of remaining amounts
    pub outstanding: Decimal,
    /// Orders whose stored total no longer matches their fee components
    pub drifted_orders: Vec<i64>,
}

/// Computes the balance totals of a platform and flags orders whose stored
/// amounts disagree with their fee components.
#[instrument(skip(db))]
pub async fn summarize(db: &DatabaseConnection, platform: Platform) -> Result<LedgerSummary> {
    let orders = list_orders(db, platform).await?;
    let payouts = list_payouts(db, Some(platform)).await?;

    let drifted_orders = orders
        .iter()
        .filter(|order| match order {
            Order::Amazon(o) => !calculator::amazon_total_matches(o),
            Order::Ebay(o) => !calculator::ebay_amounts_match(o),
        })
        .map(Order::id)
        .collect();

    Ok(LedgerSummary {
        platform,
        order_count: orders.len(),
        unpaid_count: orders
            .iter()
            .filter(|o| o.remaining_amount() > Decimal::ZERO)
            .count(),
        ordered: orders.iter().map(Order::total).sum(),
        paid_out: payouts.iter().map(|p| p.amount).sum(),
        outstanding: orders.iter().map(Order::remaining_amount).sum(),
        drifted_orders,
    })
}
