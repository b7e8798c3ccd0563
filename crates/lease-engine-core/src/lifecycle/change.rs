//! Information-only change: disclosure totals at a change date. No schedule
//! is regenerated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use super::{book_value_after, elapsed_micros, liability_after, split_after};
use crate::amortization::{totals, AmortizationLine};
use crate::depreciation::{total_depreciation, DepreciationLine};
use crate::error::LeaseError;
use crate::types::{with_metadata, ComputationOutput, Money, YearMonth};
use crate::LeaseResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeComputeInput {
    #[serde(default)]
    pub contract_id: String,
    pub amortization: Vec<AmortizationLine>,
    pub depreciation: Vec<DepreciationLine>,
    pub change_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeComputeOutput {
    pub change_month: YearMonth,
    /// Interest on lines after the change month
    pub future_interest: Money,
    pub future_principal: Money,
    pub future_payments: Money,
    /// Depreciation on lines at or before the change month
    pub elapsed_depreciation: Money,
    pub liability_at_change: Money,
    pub book_value_at_change: Money,
}

pub fn change_compute(
    input: &ChangeComputeInput,
) -> LeaseResult<ComputationOutput<ChangeComputeOutput>> {
    let start = Instant::now();
    if input.amortization.is_empty() {
        return Err(LeaseError::EmptySchedule(
            "change requires an amortization schedule".into(),
        ));
    }

    let change_month = YearMonth::from_date(input.change_date);
    let (paid, future) = split_after(&input.amortization, change_month);
    let (elapsed, _) = split_after(&input.depreciation, change_month);

    let (future_interest, future_principal) = totals(future);
    let output = ChangeComputeOutput {
        change_month,
        future_interest,
        future_principal,
        future_payments: future.iter().map(|l| l.payment).sum(),
        elapsed_depreciation: total_depreciation(elapsed),
        liability_at_change: liability_after(paid, future),
        book_value_at_change: book_value_after(elapsed, &input.depreciation),
    };

    let mut warnings = Vec::new();
    if future.is_empty() {
        warnings.push(format!("No payments remain after {change_month}"));
    }

    info!(
        contract = %input.contract_id,
        %change_month,
        future_lines = future.len(),
        "change disclosure computed"
    );

    Ok(with_metadata(
        "Split of existing schedules at the change month; disclosure totals only",
        input,
        warnings,
        elapsed_micros(start),
        output,
    ))
}
