//! Contract lifecycle operations.
//!
//! Each operation is a pure function of its input and the tenant
//! configuration. Validation runs first, then normalization, then the
//! amortization and depreciation passes, which share no state.

pub mod cancel;
pub mod change;
pub mod compute;
pub mod debt;
pub mod expire;

#[cfg(test)]
pub(crate) mod fixtures;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amortization::AmortizationLine;
use crate::classification;
use crate::depreciation::DepreciationLine;
use crate::error::LeaseError;
use crate::types::{Money, Rate, YearMonth};
use crate::LeaseResult;

pub use cancel::{cancel_compute, CancelComputeInput, CancelComputeOutput, PaymentRevision};
pub use change::{change_compute, ChangeComputeInput, ChangeComputeOutput};
pub use compute::{compute, ComparisonFigures, ComputeInput, ComputeOutput, Measurement};
pub use debt::{debt_compute, DebtComputeInput, DebtComputeOutput};
pub use expire::{expire_compute, ExpireComputeInput, ExpireComputeOutput};

// ---------------------------------------------------------------------------
// Contract terms
// ---------------------------------------------------------------------------

/// Terms of one lease contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseContract {
    pub contract_id: String,
    /// Commencement date
    pub lease_start: NaiveDate,
    pub lease_term_months: u32,
    /// Extension months reasonably certain to be exercised
    #[serde(default)]
    pub extension_months: u32,
    /// Annual discount rate, compounded monthly
    pub annual_rate: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useful_life_months: Option<u32>,
    /// Ownership of the asset passes to the lessee at the end of the term
    #[serde(default)]
    pub ownership_transfer: bool,
    #[serde(default)]
    pub residual_value: Money,
    #[serde(default)]
    pub initial_direct_costs: Money,
    /// Lessee holds a cancellation right, so cancellation losses may be scheduled
    #[serde(default)]
    pub cancellation_right: bool,
    /// Expiry policy: stop depreciating a transferred asset when the lease ends
    #[serde(default)]
    pub stop_depreciation_at_expiry: bool,
}

impl LeaseContract {
    pub fn commencement(&self) -> YearMonth {
        YearMonth::from_date(self.lease_start)
    }

    pub fn depreciation_months(&self) -> u32 {
        classification::depreciation_months(
            self.lease_term_months,
            self.extension_months,
            self.useful_life_months,
            self.ownership_transfer,
        )
    }

    pub fn validate(&self) -> LeaseResult<()> {
        if self.lease_term_months == 0 {
            return Err(LeaseError::InvalidInput {
                field: "lease_term_months".into(),
                reason: "Lease term must be greater than zero".into(),
            });
        }
        if self.annual_rate.is_sign_negative() {
            return Err(LeaseError::InvalidInput {
                field: "annual_rate".into(),
                reason: "Discount rate cannot be negative".into(),
            });
        }
        if self.residual_value.is_sign_negative() && !self.residual_value.is_zero() {
            return Err(LeaseError::InvalidInput {
                field: "residual_value".into(),
                reason: "Residual value cannot be negative".into(),
            });
        }
        if self.lease_term_months.checked_add(self.extension_months).is_none() {
            return Err(LeaseError::InvalidInput {
                field: "extension_months".into(),
                reason: "Lease term plus extension overflows".into(),
            });
        }
        if self.useful_life_months == Some(0) {
            return Err(LeaseError::InvalidInput {
                field: "useful_life_months".into(),
                reason: "Useful life must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Headline figures produced by every lifecycle operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFinancialState {
    /// Right-of-use asset recognised at commencement
    pub initial_carrying_amount: Money,
    pub lease_liability: Money,
    pub rou_asset: Money,
    /// Positive = gain
    pub gain_loss: Money,
}

// ---------------------------------------------------------------------------
// Schedule helpers
// ---------------------------------------------------------------------------

/// A schedule row keyed by month. Schedules are kept in month order.
pub trait ScheduleLine {
    fn period_month(&self) -> YearMonth;
}

impl ScheduleLine for AmortizationLine {
    fn period_month(&self) -> YearMonth {
        self.period_month
    }
}

impl ScheduleLine for DepreciationLine {
    fn period_month(&self) -> YearMonth {
        self.period_month
    }
}

/// `(lines ≤ month, lines > month)`
pub fn split_after<T: ScheduleLine>(lines: &[T], month: YearMonth) -> (&[T], &[T]) {
    lines.split_at(lines.partition_point(|l| l.period_month() <= month))
}

/// `(lines < month, lines ≥ month)`
pub fn split_before<T: ScheduleLine>(lines: &[T], month: YearMonth) -> (&[T], &[T]) {
    lines.split_at(lines.partition_point(|l| l.period_month() < month))
}

/// Outstanding liability once `kept` has been paid: the last kept balance,
/// or, before any payment, everything still to be repaid.
pub(crate) fn liability_after(kept: &[AmortizationLine], rest: &[AmortizationLine]) -> Money {
    kept.last().map_or_else(
        || rest.iter().map(|l| l.principal_repayment).sum(),
        |l| l.ending_balance,
    )
}

/// Book value once `kept` has been depreciated: the last kept closing
/// value, or the opening value of the whole schedule.
pub(crate) fn book_value_after(kept: &[DepreciationLine], all: &[DepreciationLine]) -> Money {
    kept.last()
        .map(|l| l.closing_book_value)
        .or_else(|| all.first().map(|l| l.opening_book_value))
        .unwrap_or(Decimal::ZERO)
}

pub(crate) fn elapsed_micros(start: std::time::Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depreciation::DepreciationCategory;
    use rust_decimal_macros::dec;

    fn line(y: i32, m: u32, opening: Money, dep: Money) -> DepreciationLine {
        DepreciationLine {
            period_month: YearMonth::new(y, m).unwrap(),
            opening_book_value: opening,
            closing_book_value: opening - dep,
            period_depreciation: dep,
            category: DepreciationCategory::Ordinary,
        }
    }

    #[test]
    fn test_split_helpers_partition_by_month() {
        let lines = vec![
            line(2023, 4, dec!(300), dec!(100)),
            line(2023, 5, dec!(300), dec!(100)),
            line(2023, 6, dec!(300), dec!(100)),
        ];
        let may = YearMonth::new(2023, 5).unwrap();
        let (kept, rest) = split_after(&lines, may);
        assert_eq!((kept.len(), rest.len()), (2, 1));
        let (kept, rest) = split_before(&lines, may);
        assert_eq!((kept.len(), rest.len()), (1, 2));
        assert_eq!(book_value_after(&[], &lines), dec!(300));
    }

    #[test]
    fn test_contract_validation() {
        let mut c = LeaseContract {
            contract_id: "C-1".into(),
            lease_start: NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
            lease_term_months: 36,
            extension_months: 0,
            annual_rate: dec!(0.03),
            useful_life_months: None,
            ownership_transfer: false,
            residual_value: Decimal::ZERO,
            initial_direct_costs: Decimal::ZERO,
            cancellation_right: false,
            stop_depreciation_at_expiry: false,
        };
        assert!(c.validate().is_ok());
        c.lease_term_months = 0;
        assert!(c.validate().is_err());
        c.lease_term_months = 36;
        c.useful_life_months = Some(0);
        assert!(c.validate().is_err());
        c.useful_life_months = None;
        c.lease_term_months = u32::MAX;
        c.extension_months = 1;
        assert!(matches!(
            c.validate(),
            Err(LeaseError::InvalidInput { ref field, .. }) if field == "extension_months"
        ));
    }
}
