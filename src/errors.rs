//! Unified error types for the ledger core.
//!
//! Every business failure is a distinct variant so the presentation layer can show
//! a precise message. [`Error::kind`] folds the variants into the coarse taxonomy
//! callers branch on (validation, conflict, not found, internal).

use crate::entities::Platform;
use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification of an [`Error`] for callers that only need to decide
/// how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied input that can never succeed as-is.
    Validation,
    /// The input clashes with existing state (duplicate key, lost race, existing refund).
    Conflict,
    /// The referenced record does not exist.
    NotFound,
    /// Infrastructure failure (database, configuration, I/O).
    Internal,
}

/// All errors produced by the ledger core.
#[derive(Debug, Error)]
pub enum Error {
    /// The database rejected a query or was unreachable.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Settings file could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Filesystem failure, e.g. creating the database directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required form field was blank or absent.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// A form field did not parse or is out of range.
    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidField {
        /// Wire name of the field.
        field: &'static str,
        /// The text as submitted.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A money amount is non-positive where it must be positive, or too large to store.
    #[error("Invalid amount for {field}: {amount}")]
    InvalidAmount { field: &'static str, amount: Decimal },

    /// Summing or subtracting amounts overflowed.
    #[error("Amount for {field} is too large to compute")]
    AmountOverflow { field: &'static str },

    /// A payout allocation asks for more than the order still owes.
    #[error("Order {order_id} has only {remaining} remaining, cannot allocate {requested}")]
    AllocationExceedsRemaining {
        /// Order the allocation targets.
        order_id: i64,
        /// Allocated amount.
        requested: Decimal,
        /// Balance left on the order.
        remaining: Decimal,
    },

    /// A payout allocation names an order missing from the payout's platform.
    #[error("{platform} order {order_id} does not exist and cannot receive an allocation")]
    UnknownAllocationOrder { platform: Platform, order_id: i64 },

    /// The same order appears twice in one payout.
    #[error("Order {order_id} is listed more than once in the same payout")]
    DuplicateAllocation { order_id: i64 },

    /// A payout with no allocations.
    #[error("A payout must allocate a positive total to at least one order")]
    EmptyPayout,

    /// An edit tried to change a payout's amount.
    #[error("Payout amount is derived from its allocations and cannot be changed")]
    PayoutAmountImmutable,

    /// Refund amount or type does not fit the order total.
    #[error("Refund of {amount} is not valid for an order totalling {order_total}: {reason}")]
    InvalidRefund {
        /// Requested refund amount.
        amount: Decimal,
        /// Total of the order being refunded.
        order_total: Decimal,
        /// Which rule the refund breaks.
        reason: String,
    },

    /// An order edit would leave the total below what payouts already settled.
    #[error("Order total would drop to {new_total}, below the {already_paid} already paid out")]
    TotalBelowPaid {
        /// Total the edit would set.
        new_total: Decimal,
        /// Sum already settled by payouts.
        already_paid: Decimal,
    },

    /// Order numbers are unique per platform.
    #[error("{platform} order number '{order_number}' already exists")]
    DuplicateOrderNumber {
        /// Platform whose numbering clashed.
        platform: Platform,
        /// The clashing order number.
        order_number: String,
    },

    /// An order holds at most one refund.
    #[error("{platform} order {order_id} already carries a refund")]
    RefundAlreadyRecorded { platform: Platform, order_id: i64 },

    /// The order's version changed between read and write.
    #[error("{platform} order {order_id} was modified concurrently, please retry")]
    ConcurrentModification { platform: Platform, order_id: i64 },

    /// No order with this id on the platform.
    #[error("{platform} order {order_id} not found")]
    OrderNotFound { platform: Platform, order_id: i64 },

    /// No payout with this id.
    #[error("Payout {payout_id} not found")]
    PayoutNotFound { payout_id: i64 },
}

impl Error {
    /// Maps the error onto the validation / conflict / not-found taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. }
            | Self::InvalidField { .. }
            | Self::InvalidAmount { .. }
            | Self::AmountOverflow { .. }
            | Self::AllocationExceedsRemaining { .. }
            | Self::UnknownAllocationOrder { .. }
            | Self::DuplicateAllocation { .. }
            | Self::EmptyPayout
            | Self::PayoutAmountImmutable
            | Self::InvalidRefund { .. }
            | Self::TotalBelowPaid { .. } => ErrorKind::Validation,
            Self::DuplicateOrderNumber { .. }
            | Self::RefundAlreadyRecorded { .. }
            | Self::ConcurrentModification { .. } => ErrorKind::Conflict,
            Self::OrderNotFound { .. } | Self::PayoutNotFound { .. } => ErrorKind::NotFound,
            Self::Database(_) | Self::Config { .. } | Self::Io(_) => ErrorKind::Internal,
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_taxonomy() {
        assert_eq!(Error::EmptyPayout.kind(), ErrorKind::Validation);
        assert_eq!(
            Error::AllocationExceedsRemaining {
                order_id: 1,
                requested: dec!(50),
                remaining: dec!(40),
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::DuplicateOrderNumber {
                platform: Platform::Amazon,
                order_number: "111-1".to_string(),
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(Error::PayoutNotFound { payout_id: 9 }.kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::Config {
                message: "bad".to_string()
            }
            .kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_messages_are_user_displayable() {
        let err = Error::AllocationExceedsRemaining {
            order_id: 7,
            requested: dec!(50.00),
            remaining: dec!(40.00),
        };
        assert_eq!(
            err.to_string(),
            "Order 7 has only 40.00 remaining, cannot allocate 50.00"
        );

        let err = Error::OrderNotFound {
            platform: Platform::Ebay,
            order_id: 3,
        };
        assert_eq!(err.to_string(), "EBAY order 3 not found");
    }
}
