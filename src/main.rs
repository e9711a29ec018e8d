#![allow(clippy::result_large_err)]

use dotenvy::dotenv;
use seller_ledger::{
    config::{database, settings},
    core::ledger,
    entities::Platform,
    errors::Result,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal: env vars can be set externally
    dotenv().ok();

    // 3. Settings file, falling back to defaults when absent
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    info!(
        "Payout delete policy: {:?}",
        settings.payouts.delete_policy
    );

    // 4. One pool for the whole process
    let database_url = database::get_database_url();
    database::ensure_database_dir(&database_url)?;
    let db = database::create_connection(&database_url, &settings.database)
        .await
        .inspect_err(|e| error!("Failed to connect to {}: {}", database_url, e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Startup snapshot
    for platform in [Platform::Amazon, Platform::Ebay] {
        let summary = ledger::summarize(&db, platform).await?;
        info!(
            "{}: {} orders ({} unpaid), ordered {}, paid out {}, outstanding {}",
            platform,
            summary.order_count,
            summary.unpaid_count,
            summary.ordered,
            summary.paid_out,
            summary.outstanding
        );
        if !summary.drifted_orders.is_empty() {
            warn!(
                "{} orders whose stored totals disagree with their fees: {:?}",
                platform, summary.drifted_orders
            );
        }
    }

    db.close().await?;
    Ok(())
}
