//! Payout business logic - Records settlements and allocates them against orders.
//!
//! A payout is written together with its allocation rows and every order balance
//! it touches in one database transaction. Any rejected allocation drops the
//! transaction before commit, which rolls back the balances already decremented.

use super::{
    balance::{load_payment_state, remaining_after, restore_to_order, write_remaining_amount},
    fields::{
        checked_add, ensure_storable, parse_date, parse_optional_amount, parse_optional_text,
        parse_positive_amount, parse_required_text,
    },
};
use crate::{
    config::settings::PayoutDeletePolicy,
    entities::{Payout, PayoutAllocation, Platform, payout, payout_allocation},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// One requested allocation: pay `amount` toward order `order_id`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllocationRequest {
    /// Order on the payout's platform
    pub order_id: i64,
    /// Amount applied to the order, required and positive
    pub amount: Option<String>,
}

/// Payout form as submitted by the presentation layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayout {
    /// Marketplace whose orders the payout settles
    pub platform: Platform,
    /// `YYYY-MM-DD` or RFC 3339, required
    #[serde(default)]
    pub date: Option<String>,
    /// How the funds arrived, required
    #[serde(default)]
    pub method: Option<String>,
    /// Free-form note
    #[serde(default)]
    pub description: Option<String>,
    /// At least one allocation, each order at most once
    #[serde(default)]
    pub allocations: Vec<AllocationRequest>,
}

/// Edit form for an existing payout. Absent fields keep their stored value; a
/// blank description clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayoutUpdate {
    /// New receipt date
    pub date: Option<String>,
    /// New method, must not be blank
    pub method: Option<String>,
    /// New note
    pub description: Option<String>,
    /// Only accepted when it repeats the stored amount
    pub amount: Option<String>,
}

/// A payout together with the allocation rows that make up its amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutWithAllocations {
    /// The stored payout
    pub payout: payout::Model,
    /// Its allocation rows in request order
    pub allocations: Vec<payout_allocation::Model>,
}

/// Parses the allocation list, rejecting non-positive amounts and orders listed twice.
fn parse_allocations(requests: &[AllocationRequest]) -> Result<Vec<(i64, Decimal)>> {
    let mut seen = HashSet::with_capacity(requests.len());
    let mut parsed = Vec::with_capacity(requests.len());

    for request in requests {
        let amount = parse_positive_amount("allocation amount", request.amount.as_deref())?;
        if !seen.insert(request.order_id) {
            return Err(Error::DuplicateAllocation {
                order_id: request.order_id,
            });
        }
        parsed.push((request.order_id, amount));
    }

    if parsed.is_empty() {
        return Err(Error::EmptyPayout);
    }
    Ok(parsed)
}

/// Records a payout and applies each allocation to its order.
///
/// The payout amount is the sum of the allocations. Either every allocation is
/// applied and the payout is stored, or nothing changes.
///
/// # Errors
/// * `Error::MissingField`, `Error::InvalidField` - bad date or method
/// * `Error::EmptyPayout` - no allocations
/// * `Error::InvalidAmount`, `Error::DuplicateAllocation` - bad allocation list
/// * `Error::UnknownAllocationOrder` - an allocation names an order that does not exist
/// * `Error::AllocationExceedsRemaining` - an allocation is more than its order still owes
/// * `Error::ConcurrentModification` - an order changed while the payout was applied
#[instrument(skip(db, new_payout), fields(platform = %new_payout.platform))]
pub async fn create_payout(
    db: &DatabaseConnection,
    new_payout: &NewPayout,
) -> Result<PayoutWithAllocations> {
    let platform = new_payout.platform;
    let date = parse_date("date", new_payout.date.as_deref())?;
    let method = parse_required_text("method", new_payout.method.as_deref())?;
    let description = parse_optional_text(new_payout.description.as_deref());
    let allocations = parse_allocations(&new_payout.allocations)?;
    let amount = allocations
        .iter()
        .try_fold(Decimal::ZERO, |sum, (_, allocation)| {
            checked_add("payout amount", sum, *allocation)
        })
        .and_then(|sum| ensure_storable("payout amount", sum))?;

    let txn = db.begin().await?;

    // Every allocation is checked against the balance read here before any order
    // is written; each write is then conditional on that read's version.
    let mut planned = Vec::with_capacity(allocations.len());
    for (order_id, allocation) in &allocations {
        let checked = load_payment_state(&txn, platform, *order_id)
            .await?
            .ok_or(Error::UnknownAllocationOrder {
                platform,
                order_id: *order_id,
            })
            .and_then(|state| remaining_after(&state, *allocation).map(|rest| (state, rest)))
            .inspect_err(|e| warn!("Payout rejected at order {}: {}", order_id, e))?;
        planned.push(checked);
    }
    for (state, new_remaining) in &planned {
        write_remaining_amount(&txn, platform, state, *new_remaining)
            .await
            .inspect_err(|e| warn!("Payout rolled back at order {}: {}", state.order_id, e))?;
    }

    let now = Utc::now();
    let payout_model = payout::ActiveModel {
        platform: Set(platform),
        date: Set(date),
        amount: Set(amount),
        method: Set(method),
        description: Set(description),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let payout = payout_model.insert(&txn).await?;

    let mut allocation_rows = Vec::with_capacity(allocations.len());
    for (order_id, allocation) in allocations {
        let row = payout_allocation::ActiveModel {
            payout_id: Set(payout.id),
            order_id: Set(order_id),
            amount: Set(allocation),
            ..Default::default()
        };
        allocation_rows.push(row.insert(&txn).await?);
    }

    txn.commit().await?;

    info!(
        "Recorded {} payout {} of {} via {} across {} orders",
        platform,
        payout.id,
        payout.amount,
        payout.method,
        allocation_rows.len()
    );
    Ok(PayoutWithAllocations {
        payout,
        allocations: allocation_rows,
    })
}

/// Edits the date, method or description of a payout.
///
/// # Errors
/// * `Error::PayoutNotFound` - no payout with `payout_id`
/// * `Error::PayoutAmountImmutable` - the update tries to change the amount
/// * `Error::MissingField`, `Error::InvalidField` - bad date or method
#[instrument(skip(db, update))]
pub async fn update_payout(
    db: &DatabaseConnection,
    payout_id: i64,
    update: &PayoutUpdate,
) -> Result<payout::Model> {
    let existing = Payout::find_by_id(payout_id)
        .one(db)
        .await?
        .ok_or(Error::PayoutNotFound { payout_id })?;

    let requested_amount = parse_optional_amount("amount", update.amount.as_deref())?;
    if let Some(amount) = requested_amount.filter(|a| *a != existing.amount) {
        warn!(
            "Rejected amount change on payout {} ({} -> {})",
            payout_id, existing.amount, amount
        );
        return Err(Error::PayoutAmountImmutable);
    }

    let mut model: payout::ActiveModel = existing.into();
    if update.date.is_some() {
        model.date = Set(parse_date("date", update.date.as_deref())?);
    }
    if update.method.is_some() {
        model.method = Set(parse_required_text("method", update.method.as_deref())?);
    }
    if update.description.is_some() {
        model.description = Set(parse_optional_text(update.description.as_deref()));
    }
    model.updated_at = Set(Utc::now());

    let updated = model.update(db).await?;
    info!("Updated payout {}", payout_id);
    Ok(updated)
}

/// Deletes a payout and its allocation rows.
///
/// Under [`PayoutDeletePolicy::RetainOrderBalances`] the orders keep the balances
/// the payout left them with. Under [`PayoutDeletePolicy::RestoreOrderBalances`]
/// every allocation is added back to its order, if the order still exists, in the
/// same transaction.
///
/// # Errors
/// * `Error::PayoutNotFound` - no payout with `payout_id`
/// * `Error::ConcurrentModification` - an order changed while being restored
#[instrument(skip(db))]
pub async fn delete_payout(
    db: &DatabaseConnection,
    payout_id: i64,
    policy: PayoutDeletePolicy,
) -> Result<()> {
    let txn = db.begin().await?;

    let payout = Payout::find_by_id(payout_id)
        .one(&txn)
        .await?
        .ok_or(Error::PayoutNotFound { payout_id })?;
    let allocations = PayoutAllocation::find()
        .filter(payout_allocation::Column::PayoutId.eq(payout_id))
        .all(&txn)
        .await?;

    match policy {
        PayoutDeletePolicy::RetainOrderBalances => {
            info!(
                "Deleting payout {} without touching the balances of its {} orders",
                payout_id,
                allocations.len()
            );
        }
        PayoutDeletePolicy::RestoreOrderBalances => {
            for allocation in &allocations {
                let restored =
                    restore_to_order(&txn, payout.platform, allocation.order_id, allocation.amount)
                        .await?;
                if restored.is_none() {
                    debug!(
                        "Order {} no longer exists, nothing to restore",
                        allocation.order_id
                    );
                }
            }
        }
    }

    PayoutAllocation::delete_many()
        .filter(payout_allocation::Column::PayoutId.eq(payout_id))
        .exec(&txn)
        .await?;
    payout.delete(&txn).await?;

    txn.commit().await?;
    info!("Deleted payout {} ({:?})", payout_id, policy);
    Ok(())
}

/// Finds a payout by its id, `None` if it does not exist.
pub async fn get_payout(db: &DatabaseConnection, payout_id: i64) -> Result<Option<payout::Model>> {
    Payout::find_by_id(payout_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves payouts newest first, optionally only those of one platform.
pub async fn list_payouts(
    db: &DatabaseConnection,
    platform: Option<Platform>,
) -> Result<Vec<payout::Model>> {
    let mut query = Payout::find();
    if let Some(platform) = platform {
        query = query.filter(payout::Column::Platform.eq(platform));
    }
    query
        .order_by_desc(payout::Column::Date)
        .order_by_desc(payout::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the allocation rows of a payout in the order they were recorded.
///
/// # Errors
/// Returns `Error::PayoutNotFound` if the payout does not exist.
pub async fn get_payout_allocations(
    db: &DatabaseConnection,
    payout_id: i64,
) -> Result<Vec<payout_allocation::Model>> {
    let payout = get_payout(db, payout_id)
        .await?
        .ok_or(Error::PayoutNotFound { payout_id })?;
    payout
        .find_related(PayoutAllocation)
        .order_by_asc(payout_allocation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::order::{Order, get_order};
    use crate::entities::{AmazonOrder, EbayOrder};
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn allocation(order_id: i64, amount: &str) -> AllocationRequest {
        AllocationRequest {
            order_id,
            amount: Some(amount.to_string()),
        }
    }

    fn payout_form(platform: Platform, allocations: Vec<AllocationRequest>) -> NewPayout {
        NewPayout {
            platform,
            date: Some("2024-06-01".to_string()),
            method: Some("Direct Deposit".to_string()),
            description: None,
            allocations,
        }
    }

    #[tokio::test]
    async fn test_create_payout_validation() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_payout(&db, &payout_form(Platform::Amazon, vec![])).await;
        assert!(matches!(result, Err(Error::EmptyPayout)));

        let result = create_payout(
            &db,
            &payout_form(Platform::Amazon, vec![allocation(1, "10"), allocation(1, "5")]),
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::DuplicateAllocation { order_id: 1 })
        ));

        let result =
            create_payout(&db, &payout_form(Platform::Amazon, vec![allocation(1, "-5")])).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let mut form = payout_form(Platform::Amazon, vec![allocation(1, "5")]);
        form.method = Some("  ".to_string());
        let result = create_payout(&db, &form).await;
        assert!(matches!(result, Err(Error::MissingField { field: "method" })));
    }

    #[tokio::test]
    async fn test_payout_split_across_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_test_amazon_order(&db, "P-1", "40").await?;
        let second = create_test_amazon_order(&db, "P-2", "50").await?;

        let created = create_payout(
            &db,
            &payout_form(
                Platform::Amazon,
                vec![allocation(first.id, "40"), allocation(second.id, "20")],
            ),
        )
        .await?;
        assert_eq!(created.payout.amount, dec!(60));
        assert_eq!(created.allocations.len(), 2);

        let first = get_order(&db, Platform::Amazon, first.id).await?.unwrap();
        assert!(first.remaining_amount().is_zero());
        assert!(first.is_paid());

        let second = get_order(&db, Platform::Amazon, second.id).await?.unwrap();
        assert_eq!(second.remaining_amount(), dec!(30));
        assert!(!second.is_paid());

        let stored = get_payout_allocations(&db, created.payout.id).await?;
        let sum: Decimal = stored.iter().map(|a| a.amount).sum();
        assert_eq!(sum, created.payout.amount);
        Ok(())
    }

    #[tokio::test]
    async fn test_over_allocation_rolls_back_everything() -> Result<()> {
        let db = setup_test_db().await?;
        let fine = create_test_ebay_order(&db, "P-3", "30").await?;
        let short = create_test_ebay_order(&db, "P-4", "40").await?;

        let result = create_payout(
            &db,
            &payout_form(
                Platform::Ebay,
                vec![allocation(fine.id, "30"), allocation(short.id, "50")],
            ),
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::AllocationExceedsRemaining { .. })
        ));

        // The allocation that was applied before the failure is rolled back too
        let fine = EbayOrder::find_by_id(fine.id).one(&db).await?.unwrap();
        assert_eq!(fine.remaining_amount, dec!(30));
        assert!(!fine.is_paid);
        let short = EbayOrder::find_by_id(short.id).one(&db).await?.unwrap();
        assert_eq!(short.remaining_amount, dec!(40));

        assert!(list_payouts(&db, None).await?.is_empty());
        assert!(PayoutAllocation::find().all(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_payout_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let huge = "79228162514264337593543950335";
        let result = create_payout(
            &db,
            &payout_form(Platform::Amazon, vec![allocation(1, huge), allocation(2, huge)]),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        // Each allocation fits a column, the sum does not
        let result = create_payout(
            &db,
            &payout_form(
                Platform::Amazon,
                vec![allocation(1, "9999999999.99"), allocation(2, "0.01")],
            ),
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::InvalidAmount {
                field: "payout amount",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_stale_order_version_rolls_back_payout() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_test_ebay_order(&db, "P-20", "40").await?;
        let second = create_test_ebay_order(&db, "P-21", "50").await?;

        // Simulates another writer: once the first order is paid down, the
        // second order's version moves past the one the payout read.
        db.execute_unprepared(&format!(
            "CREATE TRIGGER bump_second AFTER UPDATE OF remaining_amount ON ebay_orders \
             WHEN NEW.id = {} BEGIN \
             UPDATE ebay_orders SET version = version + 1 WHERE id = {}; END;",
            first.id, second.id
        ))
        .await?;

        let result = create_payout(
            &db,
            &payout_form(
                Platform::Ebay,
                vec![allocation(first.id, "40"), allocation(second.id, "20")],
            ),
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            Error::ConcurrentModification { order_id, .. } if order_id == second.id
        ));
        assert_eq!(err.kind(), crate::errors::ErrorKind::Conflict);

        // The first order's decrement is rolled back with everything else
        let first_stored = EbayOrder::find_by_id(first.id).one(&db).await?.unwrap();
        assert_eq!(first_stored.remaining_amount, dec!(40));
        assert!(!first_stored.is_paid);
        assert_eq!(first_stored.version, first.version);
        let second_stored = EbayOrder::find_by_id(second.id).one(&db).await?.unwrap();
        assert_eq!(second_stored.remaining_amount, dec!(50));
        assert_eq!(second_stored.version, second.version);

        assert!(list_payouts(&db, None).await?.is_empty());
        assert!(PayoutAllocation::find().all(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_payout_to_unknown_order() -> Result<()> {
        let db = setup_test_db().await?;
        let result =
            create_payout(&db, &payout_form(Platform::Amazon, vec![allocation(42, "10")])).await;
        let err = result.unwrap_err();
        assert!(matches!(err, Error::UnknownAllocationOrder { order_id: 42, .. }));
        assert_eq!(err.kind(), crate::errors::ErrorKind::Validation);

        // An eBay order id is not an Amazon order
        let ebay = create_test_ebay_order(&db, "P-5", "10").await?;
        let amazon_ids: Vec<i64> = AmazonOrder::find()
            .all(&db)
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert!(!amazon_ids.contains(&ebay.id));
        let result =
            create_payout(&db, &payout_form(Platform::Amazon, vec![allocation(ebay.id, "5")])).await;
        assert!(matches!(result, Err(Error::UnknownAllocationOrder { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_payout_retains_balances() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_amazon_order(&db, "P-6", "40").await?;
        let created = create_payout(
            &db,
            &payout_form(Platform::Amazon, vec![allocation(order.id, "40")]),
        )
        .await?;

        delete_payout(&db, created.payout.id, PayoutDeletePolicy::RetainOrderBalances).await?;

        assert!(get_payout(&db, created.payout.id).await?.is_none());
        assert!(PayoutAllocation::find().all(&db).await?.is_empty());

        // Balances are explicitly left as the payout set them
        let Order::Amazon(stored) = get_order(&db, Platform::Amazon, order.id).await?.unwrap()
        else {
            panic!("expected an Amazon order");
        };
        assert!(stored.remaining_amount.is_zero());
        assert!(stored.is_paid);

        let result =
            delete_payout(&db, created.payout.id, PayoutDeletePolicy::RetainOrderBalances).await;
        assert!(matches!(result, Err(Error::PayoutNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_payout_restores_balances() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_test_ebay_order(&db, "P-7", "40").await?;
        let second = create_test_ebay_order(&db, "P-8", "50").await?;
        let created = create_payout(
            &db,
            &payout_form(
                Platform::Ebay,
                vec![allocation(first.id, "40"), allocation(second.id, "20")],
            ),
        )
        .await?;

        delete_payout(&db, created.payout.id, PayoutDeletePolicy::RestoreOrderBalances).await?;

        let first = EbayOrder::find_by_id(first.id).one(&db).await?.unwrap();
        assert_eq!(first.remaining_amount, dec!(40));
        assert!(!first.is_paid);
        let second = EbayOrder::find_by_id(second.id).one(&db).await?.unwrap();
        assert_eq!(second.remaining_amount, dec!(50));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_payout_keeps_amount() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_amazon_order(&db, "P-9", "25").await?;
        let created = create_payout(
            &db,
            &payout_form(Platform::Amazon, vec![allocation(order.id, "25")]),
        )
        .await?;

        let updated = update_payout(
            &db,
            created.payout.id,
            &PayoutUpdate {
                method: Some("PayPal".to_string()),
                description: Some("June sweep".to_string()),
                amount: Some("25.00".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.method, "PayPal");
        assert_eq!(updated.description.as_deref(), Some("June sweep"));
        assert_eq!(updated.amount, dec!(25));
        assert_eq!(updated.date, created.payout.date);

        let result = update_payout(
            &db,
            created.payout.id,
            &PayoutUpdate {
                amount: Some("30".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::PayoutAmountImmutable)));

        let result = update_payout(&db, 999, &PayoutUpdate::default()).await;
        assert!(matches!(result, Err(Error::PayoutNotFound { payout_id: 999 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_payouts_by_platform() -> Result<()> {
        let db = setup_test_db().await?;
        let amazon = create_test_amazon_order(&db, "P-10", "100").await?;
        let ebay = create_test_ebay_order(&db, "P-11", "100").await?;

        let mut early = payout_form(Platform::Amazon, vec![allocation(amazon.id, "10")]);
        early.date = Some("2024-01-01".to_string());
        create_payout(&db, &early).await?;
        let mut late = payout_form(Platform::Amazon, vec![allocation(amazon.id, "10")]);
        late.date = Some("2024-03-01".to_string());
        create_payout(&db, &late).await?;
        create_payout(&db, &payout_form(Platform::Ebay, vec![allocation(ebay.id, "10")])).await?;

        assert_eq!(list_payouts(&db, None).await?.len(), 3);
        let amazon_payouts = list_payouts(&db, Some(Platform::Amazon)).await?;
        assert_eq!(amazon_payouts.len(), 2);
        assert!(amazon_payouts[0].date > amazon_payouts[1].date);
        assert!(
            amazon_payouts
                .iter()
                .all(|p| p.platform == Platform::Amazon)
        );
        Ok(())
    }
}
