//! Shared test utilities for the seller ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test orders with sensible defaults.

use crate::{
    config::{
        database::{create_connection, create_tables},
        settings::DatabaseSettings,
    },
    core::order::{AmazonOrderFields, EbayOrderFields, Order, OrderFields, create_order},
    entities::{Platform, amazon_order, ebay_order},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// The pool is capped at one connection: every connection to `sqlite::memory:`
/// opens its own empty database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let settings = DatabaseSettings {
        max_connections: 1,
        ..DatabaseSettings::default()
    };
    let db = create_connection("sqlite::memory:", &settings).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Routes `tracing` output through the test harness so it shows up only for
/// failing tests. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Amazon order form whose total equals `subtotal`.
///
/// # Defaults
/// * `order_date`: 2024-01-15
/// * `number_of_items`: 1
/// * every other fee: blank (zero)
pub fn amazon_fields(order_number: &str, subtotal: &str) -> AmazonOrderFields {
    AmazonOrderFields {
        order_number: Some(order_number.to_string()),
        order_date: Some("2024-01-15".to_string()),
        number_of_items: Some("1".to_string()),
        subtotal: Some(subtotal.to_string()),
        ..AmazonOrderFields::default()
    }
}

/// eBay order form whose net and total equal `item_subtotal`.
pub fn ebay_fields(order_number: &str, item_subtotal: &str) -> EbayOrderFields {
    EbayOrderFields {
        order_number: Some(order_number.to_string()),
        order_date: Some("2024-01-15".to_string()),
        order_quantity: Some("1".to_string()),
        item_subtotal: Some(item_subtotal.to_string()),
        ..EbayOrderFields::default()
    }
}

/// Creates an unpaid Amazon order with `remaining_amount == order_total == subtotal`.
pub async fn create_test_amazon_order(
    db: &DatabaseConnection,
    order_number: &str,
    subtotal: &str,
) -> Result<amazon_order::Model> {
    match create_order(db, &OrderFields::Amazon(amazon_fields(order_number, subtotal))).await? {
        Order::Amazon(order) => Ok(order),
        Order::Ebay(other) => Err(Error::OrderNotFound {
            platform: Platform::Amazon,
            order_id: other.id,
        }),
    }
}

/// Creates an unpaid eBay order with `remaining_amount == total_amount == item_subtotal`.
pub async fn create_test_ebay_order(
    db: &DatabaseConnection,
    order_number: &str,
    item_subtotal: &str,
) -> Result<ebay_order::Model> {
    match create_order(db, &OrderFields::Ebay(ebay_fields(order_number, item_subtotal))).await? {
        Order::Ebay(order) => Ok(order),
        Order::Amazon(other) => Err(Error::OrderNotFound {
            platform: Platform::Ebay,
            order_id: other.id,
        }),
    }
}
