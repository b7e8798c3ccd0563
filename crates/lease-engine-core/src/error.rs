use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::YearMonth;

#[derive(Debug, Error)]
pub enum LeaseError {
    // -- input shape --------------------------------------------------------
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Empty schedule: {0}")]
    EmptySchedule(String),

    #[error("Malformed payment date on entry {sequence}: '{value}'")]
    MalformedPaymentDate { sequence: u32, value: String },

    #[error("Payment {sequence} dated {date} precedes the previous payment dated {previous}")]
    OutOfOrderPayment {
        sequence: u32,
        date: NaiveDate,
        previous: NaiveDate,
    },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    // -- business rules -----------------------------------------------------
    #[error("Payment {sequence} is not ordered by due date and sequence number")]
    OrderingError { sequence: u32 },

    #[error("More than one payment is due on {date}")]
    DuplicateDate { date: NaiveDate },

    #[error("Payment {sequence} has a negative total ({total})")]
    NegativeTotal { sequence: u32, total: Decimal },

    #[error("Scheduled payment {sequence} has zero lease fee, variation and incentive")]
    AllZeroAmounts { sequence: u32 },

    #[error("Payment {sequence} has a negative cancellation loss")]
    NegativeCancellationLoss { sequence: u32 },

    #[error("Cancellation loss totalling {total} requires the cancellation-right option")]
    CancellationLossNotAllowed { total: Decimal },

    #[error("Payment {sequence} changes '{field}' at or before the locked month {boundary}")]
    LockedPeriodEdited {
        boundary: YearMonth,
        sequence: u32,
        field: &'static str,
    },

    #[error("Invalid cancellation edit around {boundary}: {reason}")]
    InvalidCancellationEdit { boundary: YearMonth, reason: String },

    #[error("Lease expires on {expiry}, before the last payment due on {last_payment}")]
    ExpiryBeforeLastPayment {
        expiry: NaiveDate,
        last_payment: NaiveDate,
    },

    // -- dependencies -------------------------------------------------------
    #[error("Tenant configuration unavailable for {tenant_id}/{app_id}: {reason}")]
    ConfigUnavailable {
        tenant_id: String,
        app_id: String,
        reason: String,
    },

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl LeaseError {
    /// True for failures of an external collaborator, which the caller may retry.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(
            self,
            LeaseError::ConfigUnavailable { .. } | LeaseError::Persistence(_)
        )
    }
}

impl From<serde_json::Error> for LeaseError {
    fn from(e: serde_json::Error) -> Self {
        LeaseError::SerializationError(e.to_string())
    }
}
