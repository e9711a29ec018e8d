//! Core business logic, independent of any presentation layer.

/// Remaining-balance tracking with version-guarded writes
pub mod balance;
/// Order total calculation
pub mod calculator;
/// Parsing of raw form values
pub mod fields;
/// Order and payout timeline plus balance snapshot
pub mod ledger;
/// Order create, update, delete and listing
pub mod order;
/// Payout allocation and lifecycle
pub mod payout;
/// Refund adjustment
pub mod refund;
/// Payout grouping by method or platform
pub mod summary;
