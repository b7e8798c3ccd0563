//! Initial recognition of a lease.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use super::{elapsed_micros, ContractFinancialState, LeaseContract};
use crate::amortization::{build_amortization_schedule, AmortizationLine, AmortizationParams};
use crate::classification::{classify_short_or_minor, LeaseCategory};
use crate::config::TenantConfig;
use crate::depreciation::{build_depreciation_schedule, DepreciationLine, DepreciationPlan};
use crate::error::LeaseError;
use crate::payments::{normalize_payments, total_scheduled_fee, PaymentEntry};
use crate::time_value::{pv_from_commencement, pv_from_comparison_start};
use crate::types::{with_metadata, ComputationOutput, Money, YearMonth};
use crate::validation::{validate_expire_date, validate_pay_data};
use crate::LeaseResult;

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// Where measurement starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Measurement {
    /// Measure everything from the commencement date
    #[default]
    FromInception,
    /// Measure the liability from a comparison point and interpolate the
    /// asset there, booking the difference as gain/loss
    Retrospective { comparison_start: YearMonth },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeInput {
    pub contract: LeaseContract,
    pub payments: Vec<PaymentEntry>,
    #[serde(default)]
    pub measurement: Measurement,
}

/// Figures at the comparison point of a retrospective measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonFigures {
    pub comparison_start: YearMonth,
    /// Months between commencement and the comparison point
    pub elapsed_months: u32,
    pub present_value: Money,
    pub rou_asset: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeOutput {
    pub state: ContractFinancialState,
    pub category: LeaseCategory,
    pub expiry_date: NaiveDate,
    pub depreciation_months: u32,
    /// Normalized payment schedule
    pub payments: Vec<PaymentEntry>,
    pub amortization: Vec<AmortizationLine>,
    pub depreciation: Vec<DepreciationLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonFigures>,
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Compute: initial lease liability, right-of-use asset and both schedules.
pub fn compute(
    input: &ComputeInput,
    config: &TenantConfig,
) -> LeaseResult<ComputationOutput<ComputeOutput>> {
    let start = Instant::now();
    let contract = &input.contract;
    contract.validate()?;
    config.validate()?;

    validate_pay_data(&input.payments, contract.cancellation_right)?;
    let expiry_date = validate_expire_date(
        contract.lease_start,
        contract.lease_term_months,
        contract.extension_months,
        &input.payments,
    )?;
    let payments = normalize_payments(&input.payments)?;

    let mut warnings = Vec::new();
    let category = classify_short_or_minor(
        contract.lease_term_months,
        contract.extension_months,
        total_scheduled_fee(&input.payments),
        config,
    );
    if category.is_exempt() {
        warnings.push(format!(
            "Lease classifies as {category:?}; recognition on balance sheet may be exempted"
        ));
    }

    let commencement = contract.commencement();
    let liability = pv_from_commencement(&payments, commencement, contract.annual_rate)?;
    let carrying = liability + contract.initial_direct_costs;
    let depreciation_months = contract.depreciation_months();

    let (state, amortization, depreciation, comparison) = match input.measurement {
        Measurement::FromInception => {
            let amortization = build_amortization_schedule(
                &payments,
                &AmortizationParams {
                    opening_balance: liability,
                    annual_rate: contract.annual_rate,
                    anchor: commencement,
                    fiscal_year_start_month: config.fiscal_year_start_month,
                },
            )?;
            let depreciation = build_depreciation_schedule(&DepreciationPlan::from_commencement(
                carrying,
                contract.residual_value,
                depreciation_months,
                contract.lease_start,
                config,
            ))?;
            let state = ContractFinancialState {
                initial_carrying_amount: carrying,
                lease_liability: liability,
                rou_asset: carrying,
                gain_loss: Decimal::ZERO,
            };
            (state, amortization, depreciation, None)
        }
        Measurement::Retrospective { comparison_start } => {
            let elapsed = commencement.months_until(comparison_start);
            if elapsed < 0 {
                return Err(LeaseError::InvalidInput {
                    field: "comparison_start".into(),
                    reason: format!("{comparison_start} precedes commencement {commencement}"),
                });
            }
            let elapsed = elapsed as u32;
            let remaining_months = depreciation_months.saturating_sub(elapsed);
            let rou_asset = interpolate_rou_asset(
                carrying,
                contract.residual_value,
                remaining_months,
                depreciation_months,
            );

            let outstanding: Vec<PaymentEntry> = payments
                .iter()
                .filter(|p| p.month() >= comparison_start)
                .cloned()
                .collect();
            if outstanding.is_empty() {
                return Err(LeaseError::EmptySchedule(format!(
                    "no payments fall due from {comparison_start}"
                )));
            }
            let present_value =
                pv_from_comparison_start(&outstanding, comparison_start, contract.annual_rate)?;

            let amortization = build_amortization_schedule(
                &outstanding,
                &AmortizationParams {
                    opening_balance: present_value,
                    annual_rate: contract.annual_rate,
                    anchor: comparison_start,
                    fiscal_year_start_month: config.fiscal_year_start_month,
                },
            )?;
            let depreciation =
                build_depreciation_schedule(&DepreciationPlan::from_comparison_start(
                    rou_asset,
                    contract.residual_value.min(rou_asset),
                    remaining_months,
                    comparison_start,
                ))?;
            let state = ContractFinancialState {
                initial_carrying_amount: carrying,
                lease_liability: present_value,
                rou_asset,
                gain_loss: present_value - rou_asset,
            };
            let figures = ComparisonFigures {
                comparison_start,
                elapsed_months: elapsed,
                present_value,
                rou_asset,
            };
            (state, amortization, depreciation, Some(figures))
        }
    };

    info!(
        contract = %contract.contract_id,
        liability = %state.lease_liability,
        rou_asset = %state.rou_asset,
        "lease recognised"
    );

    let output = ComputeOutput {
        state,
        category,
        expiry_date,
        depreciation_months,
        payments,
        amortization,
        depreciation,
        comparison,
    };

    Ok(with_metadata(
        "Lease liability at floored present value of payments (monthly compounding); \
         effective-interest amortization; straight-line ROU depreciation by fiscal period",
        input,
        warnings,
        elapsed_micros(start),
        output,
    ))
}

/// Straight-line book value after `total − remaining` of `total` months.
fn interpolate_rou_asset(carrying: Money, residual: Money, remaining: u32, total: u32) -> Money {
    if total == 0 {
        return carrying;
    }
    let base = carrying - residual;
    residual + (base * Decimal::from(remaining) / Decimal::from(total)).floor()
}
