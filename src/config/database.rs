//! Database configuration module for the seller ledger.
//!
//! This module opens the single process-wide `SeaORM` connection pool and creates
//! the tables from the entity definitions. `Schema::create_table_from_entity` keeps
//! the schema in lockstep with the Rust structs without hand-written SQL.

use super::settings::DatabaseSettings;
use crate::entities::{AmazonOrder, EbayOrder, Payout, PayoutAllocation};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::{path::Path, time::Duration};
use tracing::{info, instrument};

/// Used when `DATABASE_URL` is not set. `mode=rwc` lets `SQLite` create the file.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/seller_ledger.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Creates the directory holding a file-backed `SQLite` database so `mode=rwc` can
/// create the file itself. Other URLs are left alone.
///
/// # Errors
/// Returns `Error::Io` if the directory cannot be created.
pub fn ensure_database_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or_default();
    if file.is_empty() || file == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Opens the connection pool for `database_url` with the configured limits.
///
/// The returned handle is cheap to share by reference and is meant to live for the
/// whole process; call [`DatabaseConnection::close`] once at shutdown.
#[instrument(skip(settings))]
pub async fn create_connection(
    database_url: &str,
    settings: &DatabaseSettings,
) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .sqlx_logging(settings.sqlx_logging);

    let db = Database::connect(options).await?;
    info!(
        "Connection pool opened (max_connections={})",
        settings.max_connections
    );
    Ok(db)
}

/// Creates all ledger tables if they do not already exist.
///
/// Payouts are created before their allocations so the allocation foreign key
/// has a target.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let amazon_table = schema
        .create_table_from_entity(AmazonOrder)
        .if_not_exists()
        .to_owned();
    let ebay_table = schema
        .create_table_from_entity(EbayOrder)
        .if_not_exists()
        .to_owned();
    let payout_table = schema
        .create_table_from_entity(Payout)
        .if_not_exists()
        .to_owned();
    let allocation_table = schema
        .create_table_from_entity(PayoutAllocation)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&amazon_table)).await?;
    db.execute(builder.build(&ebay_table)).await?;
    db.execute(builder.build(&payout_table)).await?;
    db.execute(builder.build(&allocation_table)).await?;

    info!("Ledger tables ensured");
    Ok(())
}
