//! End of term.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use super::{book_value_after, elapsed_micros, split_after, LeaseContract};
use crate::depreciation::DepreciationLine;
use crate::error::LeaseError;
use crate::types::{with_metadata, ComputationOutput, Money, YearMonth};
use crate::validation::expiry_date;
use crate::LeaseResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpireComputeInput {
    pub contract: LeaseContract,
    pub depreciation: Vec<DepreciationLine>,
    /// Defaults to the last day of the lease term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpireComputeOutput {
    /// False when the schedule was left untouched
    pub recomputed: bool,
    pub expiry_month: YearMonth,
    pub residual_book_value: Money,
    pub depreciation: Vec<DepreciationLine>,
    pub truncated_lines: usize,
}

/// ExpireCompute: stop depreciating a transferred asset at the end of the
/// lease. Any other lease is returned unchanged.
pub fn expire_compute(
    input: &ExpireComputeInput,
) -> LeaseResult<ComputationOutput<ExpireComputeOutput>> {
    let start = Instant::now();
    let contract = &input.contract;
    contract.validate()?;

    let expiry = match input.expiry_date {
        Some(date) => date,
        None => last_day_of_term(contract)?,
    };
    let expiry_month = YearMonth::from_date(expiry);

    let mut warnings = Vec::new();
    let output = if contract.ownership_transfer && contract.stop_depreciation_at_expiry {
        let (kept, dropped) = split_after(&input.depreciation, expiry_month);
        if kept.is_empty() && !input.depreciation.is_empty() {
            warnings.push(format!("Depreciation starts after expiry month {expiry_month}"));
        }
        ExpireComputeOutput {
            recomputed: true,
            expiry_month,
            residual_book_value: book_value_after(kept, &input.depreciation),
            depreciation: kept.to_vec(),
            truncated_lines: dropped.len(),
        }
    } else {
        ExpireComputeOutput {
            recomputed: false,
            expiry_month,
            residual_book_value: book_value_after(&input.depreciation, &input.depreciation),
            depreciation: input.depreciation.clone(),
            truncated_lines: 0,
        }
    };

    info!(
        contract = %contract.contract_id,
        %expiry_month,
        recomputed = output.recomputed,
        residual = %output.residual_book_value,
        "lease expiry processed"
    );

    Ok(with_metadata(
        "Depreciation truncated at the expiry month for ownership-transferring leases",
        input,
        warnings,
        elapsed_micros(start),
        output,
    ))
}

fn last_day_of_term(contract: &LeaseContract) -> LeaseResult<NaiveDate> {
    expiry_date(
        contract.lease_start,
        contract.lease_term_months,
        contract.extension_months,
    )?
    .checked_sub_days(Days::new(1))
    .ok_or_else(|| LeaseError::DateError("lease expiry is out of range".into()))
}
