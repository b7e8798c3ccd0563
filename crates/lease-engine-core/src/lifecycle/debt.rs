//! Lease modification: re-measurement of the liability, with an optional
//! proportional reduction of scope.
//!
//! The old schedules are split at the change month. Lines up to and including
//! it are kept as booked; everything after is superseded and regenerated from
//! the first month after the change, using the present value of the new
//! remaining payments as the opening liability. Depreciation already booked
//! for the regenerated months (up to the processing month) stays in place and
//! is reconciled by a single adjustment line.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::{
    book_value_after, elapsed_micros, liability_after, split_after, ContractFinancialState,
    LeaseContract,
};
use crate::amortization::{build_amortization_schedule, AmortizationLine, AmortizationParams};
use crate::config::TenantConfig;
use crate::depreciation::{
    build_depreciation_schedule, total_depreciation, DepreciationLine, DepreciationPlan,
};
use crate::error::LeaseError;
use crate::payments::{normalize_payments, PaymentEntry};
use crate::time_value::pv_from_comparison_start;
use crate::types::{with_metadata, ComputationOutput, Money, Rate, YearMonth};
use crate::validation::{
    validate_cancellation_pay_data, validate_expire_date, validate_pay_changeable,
    validate_pay_data,
};
use crate::LeaseResult;

fn full_scope() -> Rate {
    Decimal::ONE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtComputeInput {
    pub contract: LeaseContract,
    pub old_payments: Vec<PaymentEntry>,
    pub new_payments: Vec<PaymentEntry>,
    pub amortization: Vec<AmortizationLine>,
    pub depreciation: Vec<DepreciationLine>,
    pub change_date: NaiveDate,
    /// Share of the leased scope retained, in (0, 1]
    #[serde(default = "full_scope")]
    pub percentage: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtComputeOutput {
    pub state: ContractFinancialState,
    pub change_month: YearMonth,
    pub liability_before: Money,
    pub asset_before: Money,
    /// Liability derecognised by the scope reduction
    pub reduced_liability: Money,
    pub reduced_asset: Money,
    pub unrecognized_financing_cost: Money,
    /// Present value of the new payments after the change month
    pub remeasured_liability: Money,
    /// Normalized replacement schedule
    pub payments: Vec<PaymentEntry>,
    /// Kept lines followed by the regenerated ones
    pub amortization: Vec<AmortizationLine>,
    /// Kept lines, lines booked up to the processing month, the adjustment,
    /// then regenerated lines after the processing month
    pub depreciation: Vec<DepreciationLine>,
    pub superseded_amortization: Vec<AmortizationLine>,
    pub superseded_depreciation: Vec<DepreciationLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<DepreciationLine>,
}

/// DebtCompute: re-measure a modified lease.
pub fn debt_compute(
    input: &DebtComputeInput,
    config: &TenantConfig,
) -> LeaseResult<ComputationOutput<DebtComputeOutput>> {
    let start = Instant::now();
    let contract = &input.contract;
    contract.validate()?;
    config.validate()?;
    let p = input.percentage;
    if p <= Decimal::ZERO || p > Decimal::ONE {
        return Err(LeaseError::InvalidInput {
            field: "percentage".into(),
            reason: format!("retained share {p} must lie in (0, 1]"),
        });
    }
    if input.amortization.is_empty() {
        return Err(LeaseError::EmptySchedule(
            "modification requires the existing amortization schedule".into(),
        ));
    }

    let change_month = YearMonth::from_date(input.change_date);
    let processing = config.processing_period;
    validate_pay_data(&input.new_payments, contract.cancellation_right)?;
    validate_expire_date(
        contract.lease_start,
        contract.lease_term_months,
        contract.extension_months,
        &input.new_payments,
    )?;
    if let Some(cancellation_date) = input.cancellation_date {
        validate_cancellation_pay_data(
            &input.old_payments,
            &input.new_payments,
            processing,
            YearMonth::from_date(cancellation_date),
        )?;
    }
    validate_pay_changeable(&input.old_payments, &input.new_payments, change_month, processing)?;

    let (kept_amortization, superseded_amortization) =
        split_after(&input.amortization, change_month);
    let (kept_depreciation, superseded_depreciation) =
        split_after(&input.depreciation, change_month);
    let liability_before = liability_after(kept_amortization, superseded_amortization);
    let asset_before = book_value_after(kept_depreciation, &input.depreciation);

    let anchor = change_month.next();
    let payments = normalize_payments(&input.new_payments)?;
    let remaining: Vec<PaymentEntry> = payments
        .iter()
        .filter(|e| e.month() >= anchor)
        .cloned()
        .collect();
    if remaining.is_empty() {
        return Err(LeaseError::EmptySchedule(format!(
            "no payments remain after {change_month}"
        )));
    }
    let remeasured_liability = pv_from_comparison_start(&remaining, anchor, contract.annual_rate)?;

    // Scope reduction first, then re-measurement of what is left.
    let mut gain_loss = Decimal::ZERO;
    let (mut reduced_liability, mut reduced_asset) = (Decimal::ZERO, Decimal::ZERO);
    let mut unrecognized_financing_cost = Decimal::ZERO;
    if p < Decimal::ONE {
        let released = Decimal::ONE - p;
        reduced_liability = (liability_before * released).floor();
        reduced_asset = (asset_before * released).floor();
        let superseded_cash: Money = superseded_amortization.iter().map(|l| l.payment).sum();
        unrecognized_financing_cost = (superseded_cash * released).floor() - reduced_liability;
        gain_loss += reduced_liability - reduced_asset;
        debug!(
            %reduced_liability,
            %reduced_asset,
            %unrecognized_financing_cost,
            "scope reduced"
        );
    }
    let liability = liability_before - reduced_liability;
    let asset = asset_before - reduced_asset;
    let (new_liability, new_asset, remeasurement_gain) =
        remeasure(liability, asset, remeasured_liability);
    gain_loss += remeasurement_gain;

    let regenerated_amortization = build_amortization_schedule(
        &remaining,
        &AmortizationParams {
            opening_balance: new_liability,
            annual_rate: contract.annual_rate,
            anchor,
            fiscal_year_start_month: config.fiscal_year_start_month,
        },
    )?;

    let elapsed = contract.commencement().months_until(anchor).max(0) as u32;
    let remaining_months = contract.depreciation_months().saturating_sub(elapsed);
    let regenerated_depreciation = build_depreciation_schedule(&DepreciationPlan::from_remeasurement(
        new_asset,
        contract.residual_value.min(new_asset),
        remaining_months,
        anchor,
        config,
    ))?;

    let adjustment = reconcile_booked_window(
        superseded_depreciation,
        &regenerated_depreciation,
        new_asset,
        change_month,
        processing,
    );
    // Booked months stay as posted; the adjustment carries the difference.
    let depreciation = match &adjustment {
        Some(line) => {
            let (booked, _) = split_after(superseded_depreciation, processing);
            let (_, upcoming) = split_after(&regenerated_depreciation, processing);
            let mut lines = [kept_depreciation, booked].concat();
            lines.push(line.clone());
            lines.extend_from_slice(upcoming);
            lines
        }
        None => [kept_depreciation, &regenerated_depreciation[..]].concat(),
    };

    let mut warnings = Vec::new();
    if new_asset.is_zero() && !asset.is_zero() {
        warnings.push("Right-of-use asset fully written down; excess booked to gain".into());
    }

    info!(
        contract = %contract.contract_id,
        %change_month,
        liability = %new_liability,
        rou_asset = %new_asset,
        %gain_loss,
        "lease re-measured"
    );

    let output = DebtComputeOutput {
        state: ContractFinancialState {
            initial_carrying_amount: book_value_after(&[], &input.depreciation),
            lease_liability: new_liability,
            rou_asset: new_asset,
            gain_loss,
        },
        change_month,
        liability_before,
        asset_before,
        reduced_liability,
        reduced_asset,
        unrecognized_financing_cost,
        remeasured_liability,
        payments,
        amortization: [kept_amortization, &regenerated_amortization[..]].concat(),
        depreciation,
        superseded_amortization: superseded_amortization.to_vec(),
        superseded_depreciation: superseded_depreciation.to_vec(),
        adjustment,
    };

    Ok(with_metadata(
        "Re-measurement at present value of revised payments from the month after the change; \
         proportional derecognition for scope reductions",
        input,
        warnings,
        elapsed_micros(start),
        output,
    ))
}

/// Move the liability to its re-measured value and the asset by the same
/// amount, never below zero. Returns `(liability, asset, gain_loss)`.
fn remeasure(liability: Money, asset: Money, remeasured: Money) -> (Money, Money, Money) {
    let new_asset = (asset + remeasured - liability).max(Decimal::ZERO);
    let gain_loss = (liability - remeasured) - (asset - new_asset);
    (remeasured, new_asset, gain_loss)
}

/// Collapse the difference between regenerated and already booked
/// depreciation over `(change, processing]` into one adjustment line.
fn reconcile_booked_window(
    superseded: &[DepreciationLine],
    regenerated: &[DepreciationLine],
    new_asset: Money,
    change_month: YearMonth,
    processing: YearMonth,
) -> Option<DepreciationLine> {
    if processing <= change_month {
        return None;
    }
    let (booked, _) = split_after(superseded, processing);
    let (recomputed, _) = split_after(regenerated, processing);
    let booked_total = total_depreciation(booked);
    let delta = total_depreciation(recomputed) - booked_total;
    if booked.is_empty() && recomputed.is_empty() {
        return None;
    }
    Some(DepreciationLine::adjustment(
        processing,
        new_asset - booked_total,
        delta,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::IntoLineItems;
    use crate::depreciation::DepreciationCategory;
    use crate::lifecycle::compute::{compute, ComputeInput, Measurement};
    use crate::lifecycle::fixtures::{config, contract, monthly, ym};
    use rust_decimal_macros::dec;

    fn base_input(processing: YearMonth) -> DebtComputeInput {
        let payments = monthly(12, dec!(10000));
        let computed = compute(
            &ComputeInput {
                contract: contract(),
                payments: payments.clone(),
                measurement: Measurement::FromInception,
            },
            &config(processing.year(), processing.month()),
        )
        .unwrap()
        .result;
        DebtComputeInput {
            contract: contract(),
            old_payments: payments.clone(),
            new_payments: payments,
            amortization: computed.amortization,
            depreciation: computed.depreciation,
            change_date: NaiveDate::from_ymd_opt(2023, 9, 10).unwrap(),
            percentage: Decimal::ONE,
            cancellation_date: None,
        }
    }

    #[test]
    fn test_full_remeasurement_with_unchanged_flows_has_no_gain() {
        let input = base_input(ym(2023, 9));
        let out = debt_compute(&input, &config(2023, 9)).unwrap().result;

        assert_eq!(out.state.gain_loss, Decimal::ZERO);
        assert_eq!(out.change_month, ym(2023, 9));
        assert_eq!(out.liability_before, input.amortization[5].ending_balance);
        assert_eq!(out.asset_before, input.depreciation[5].closing_book_value);
        assert_eq!(out.amortization.len(), 12);
        assert_eq!(out.amortization.last().unwrap().ending_balance, Decimal::ZERO);
        assert_eq!(out.amortization[6].period_month, ym(2023, 10));
        assert_eq!(out.depreciation.len(), 36);
        assert_eq!(out.superseded_amortization.len(), 6);
        assert!(out.adjustment.is_none());
        // Asset moves with the liability
        assert_eq!(
            out.state.rou_asset - out.asset_before,
            out.state.lease_liability - out.liability_before
        );
    }

    #[test]
    fn test_adjustment_reconciles_booked_window() {
        let input = base_input(ym(2023, 12));
        let cfg = config(2023, 12);
        let out = debt_compute(&input, &cfg).unwrap().result;

        let adjustment = out.adjustment.clone().unwrap();
        assert_eq!(adjustment.category, DepreciationCategory::Adjustment);
        assert_eq!(adjustment.period_month, ym(2023, 12));

        // October to December stay as booked, then the adjustment, then January on.
        assert_eq!(out.depreciation[6..9], input.depreciation[6..9]);
        assert_eq!(out.depreciation[9], adjustment);
        assert_eq!(out.depreciation[10].period_month, ym(2024, 1));
        assert_eq!(out.depreciation.len(), 6 + 3 + 1 + 27);

        let regenerated = build_depreciation_schedule(&DepreciationPlan::from_remeasurement(
            out.state.rou_asset,
            Decimal::ZERO,
            30,
            ym(2023, 10),
            &cfg,
        ))
        .unwrap();
        let booked = total_depreciation(&input.depreciation[6..9]);
        let recomputed = total_depreciation(&regenerated[..3]);
        assert_eq!(adjustment.period_depreciation, recomputed - booked);
        assert_eq!(
            adjustment.closing_book_value,
            regenerated[2].closing_book_value
        );
        assert_eq!(out.depreciation[10..], regenerated[3..]);
    }

    #[test]
    fn test_raised_fees_depreciate_new_asset_exactly_once() {
        let mut input = base_input(ym(2023, 12));
        for entry in input.new_payments.iter_mut().skip(9) {
            entry.lease_fee = dec!(12000);
        }
        let out = debt_compute(&input, &config(2023, 12)).unwrap().result;

        let adjustment = out.adjustment.clone().unwrap();
        assert!(!adjustment.period_depreciation.is_zero());
        assert!(out.state.rou_asset > out.asset_before);

        let kept = total_depreciation(&input.depreciation[..6]);
        let expected = kept + out.state.rou_asset - input.contract.residual_value;
        assert_eq!(total_depreciation(&out.depreciation), expected);

        let bundle = out.to_line_items("C-1");
        let adjustments = bundle
            .depreciation_lines
            .iter()
            .filter(|l| l.category == DepreciationCategory::Adjustment)
            .count();
        assert_eq!(adjustments, 1);
        assert_eq!(bundle.summary.total_depreciation, expected);
        assert_eq!(
            bundle.depreciation_lines.last().unwrap().closing_book_value,
            input.contract.residual_value
        );
    }

    #[test]
    fn test_partial_termination_halves_scope() {
        let mut input = base_input(ym(2023, 9));
        input.percentage = dec!(0.5);
        for entry in input.new_payments.iter_mut().skip(6) {
            entry.lease_fee = dec!(5000);
        }
        let out = debt_compute(&input, &config(2023, 9)).unwrap().result;

        assert_eq!(out.reduced_liability, (out.liability_before * dec!(0.5)).floor());
        assert_eq!(out.reduced_asset, (out.asset_before * dec!(0.5)).floor());
        assert_eq!(
            out.unrecognized_financing_cost,
            dec!(30000) - out.reduced_liability
        );
        assert_eq!(out.state.lease_liability, out.remeasured_liability);
        assert_eq!(out.state.gain_loss, out.reduced_liability - out.reduced_asset);
        assert_eq!(out.amortization.last().unwrap().ending_balance, Decimal::ZERO);
        assert_eq!(out.amortization[6].payment, dec!(5000));
    }

    #[test]
    fn test_percentage_out_of_range() {
        for p in [Decimal::ZERO, dec!(1.01), dec!(-0.5)] {
            let mut input = base_input(ym(2023, 9));
            input.percentage = p;
            assert!(matches!(
                debt_compute(&input, &config(2023, 9)),
                Err(LeaseError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn test_locked_edit_rejected() {
        let mut input = base_input(ym(2023, 9));
        input.new_payments[2].lease_fee = dec!(9000);
        assert!(matches!(
            debt_compute(&input, &config(2023, 9)),
            Err(LeaseError::LockedPeriodEdited { .. })
        ));
    }

    #[test]
    fn test_remeasure_caps_asset_at_zero() {
        let (liability, asset, gain) = remeasure(dec!(1000), dec!(100), dec!(500));
        assert_eq!(liability, dec!(500));
        assert_eq!(asset, Decimal::ZERO);
        assert_eq!(gain, dec!(400));
    }
}
