//! Early termination of a lease.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use super::{
    book_value_after, elapsed_micros, liability_after, split_after, split_before,
    ContractFinancialState, LeaseContract,
};
use crate::amortization::AmortizationLine;
use crate::config::TenantConfig;
use crate::depreciation::{total_depreciation, DepreciationLine};
use crate::error::LeaseError;
use crate::payments::PaymentEntry;
use crate::types::{with_metadata, ComputationOutput, Money, YearMonth};
use crate::validation::{validate_cancellation_pay_data, validate_pay_data};
use crate::LeaseResult;

/// Replacement schedule submitted together with a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRevision {
    pub old: Vec<PaymentEntry>,
    pub new: Vec<PaymentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelComputeInput {
    pub contract: LeaseContract,
    pub amortization: Vec<AmortizationLine>,
    pub depreciation: Vec<DepreciationLine>,
    pub cancellation_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_revision: Option<PaymentRevision>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelComputeOutput {
    pub state: ContractFinancialState,
    pub cancellation_month: YearMonth,
    /// Liability outstanding immediately before the cancellation month
    pub remain_debt: Money,
    /// Book value written off
    pub write_off_loss: Money,
    /// Depreciation posted from the cancellation month to the processing month
    pub reversed_depreciation: Money,
    pub cancellation_loss_total: Money,
    /// Lines before the cancellation month
    pub amortization: Vec<AmortizationLine>,
    /// Retained and posted lines, then the reversal
    pub depreciation: Vec<DepreciationLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<DepreciationLine>,
}

/// CancelCompute: derecognise the liability and asset at the cancellation month.
pub fn cancel_compute(
    input: &CancelComputeInput,
    config: &TenantConfig,
) -> LeaseResult<ComputationOutput<CancelComputeOutput>> {
    let start = Instant::now();
    let contract = &input.contract;
    contract.validate()?;
    config.validate()?;
    if input.amortization.is_empty() {
        return Err(LeaseError::EmptySchedule(
            "cancellation requires the existing amortization schedule".into(),
        ));
    }

    let cancellation_month = YearMonth::from_date(input.cancellation_date);
    if cancellation_month < contract.commencement() {
        return Err(LeaseError::InvalidInput {
            field: "cancellation_date".into(),
            reason: format!(
                "{} precedes lease start {}",
                input.cancellation_date, contract.lease_start
            ),
        });
    }
    let processing = config.processing_period;

    let mut cancellation_loss_total = Decimal::ZERO;
    if let Some(revision) = &input.payment_revision {
        validate_pay_data(&revision.new, contract.cancellation_right)?;
        validate_cancellation_pay_data(
            &revision.old,
            &revision.new,
            processing,
            cancellation_month,
        )?;
        cancellation_loss_total = revision.new.iter().map(|e| e.cancellation_loss).sum();
    }

    let (retained_amortization, cancelled_amortization) =
        split_before(&input.amortization, cancellation_month);
    let (retained_depreciation, after_cancellation) =
        split_before(&input.depreciation, cancellation_month);
    let (posted, _) = split_after(after_cancellation, processing);

    let remain_debt = liability_after(retained_amortization, cancelled_amortization);
    let write_off_loss = book_value_after(retained_depreciation, &input.depreciation);
    let reversed_depreciation = total_depreciation(posted);

    let adjustment = posted.last().map(|last| {
        DepreciationLine::adjustment(
            processing,
            last.closing_book_value,
            -reversed_depreciation,
        )
    });
    let mut depreciation = [retained_depreciation, posted].concat();
    depreciation.extend(adjustment.clone());

    let mut warnings = Vec::new();
    if !cancellation_loss_total.is_zero() {
        warnings.push(format!(
            "Cancellation loss of {cancellation_loss_total} is payable in addition to the write-off"
        ));
    }

    let gain_loss = remain_debt - write_off_loss;
    info!(
        contract = %contract.contract_id,
        %cancellation_month,
        %remain_debt,
        %write_off_loss,
        %gain_loss,
        "lease cancelled"
    );

    let output = CancelComputeOutput {
        state: ContractFinancialState {
            initial_carrying_amount: book_value_after(&[], &input.depreciation),
            lease_liability: Decimal::ZERO,
            rou_asset: Decimal::ZERO,
            gain_loss,
        },
        cancellation_month,
        remain_debt,
        write_off_loss,
        reversed_depreciation,
        cancellation_loss_total,
        amortization: retained_amortization.to_vec(),
        depreciation,
        adjustment,
    };

    Ok(with_metadata(
        "Derecognition at book values immediately before the cancellation month; \
         posted depreciation reversed in one adjustment line",
        input,
        warnings,
        elapsed_micros(start),
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depreciation::DepreciationCategory;
    use crate::lifecycle::compute::{compute, ComputeInput, ComputeOutput, Measurement};
    use crate::lifecycle::fixtures::{config, contract, monthly, ym};
    use rust_decimal_macros::dec;

    fn recognised() -> ComputeOutput {
        compute(
            &ComputeInput {
                contract: contract(),
                payments: monthly(12, dec!(10000)),
                measurement: Measurement::FromInception,
            },
            &config(2023, 4),
        )
        .unwrap()
        .result
    }

    fn input(date: NaiveDate, computed: &ComputeOutput) -> CancelComputeInput {
        CancelComputeInput {
            contract: contract(),
            amortization: computed.amortization.clone(),
            depreciation: computed.depreciation.clone(),
            cancellation_date: date,
            payment_revision: None,
        }
    }

    #[test]
    fn test_cancel_at_lease_start_writes_off_initial_amounts() {
        let computed = recognised();
        let input = input(NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(), &computed);
        let out = cancel_compute(&input, &config(2023, 6)).unwrap().result;

        assert_eq!(out.remain_debt, computed.state.lease_liability);
        assert_eq!(out.write_off_loss, computed.state.initial_carrying_amount);
        assert!(out.amortization.is_empty());
        // April to June posted, then reversed
        assert_eq!(out.reversed_depreciation, total_depreciation(&computed.depreciation[..3]));
        let adjustment = out.adjustment.unwrap();
        assert_eq!(adjustment.period_month, ym(2023, 6));
        assert_eq!(adjustment.category, DepreciationCategory::Adjustment);
        assert_eq!(adjustment.period_depreciation, -out.reversed_depreciation);
        assert_eq!(adjustment.closing_book_value, out.write_off_loss);
        assert_eq!(out.depreciation.len(), 4);
    }

    #[test]
    fn test_cancel_mid_term_keeps_elapsed_lines() {
        let computed = recognised();
        let input = input(NaiveDate::from_ymd_opt(2023, 10, 15).unwrap(), &computed);
        let out = cancel_compute(&input, &config(2023, 9)).unwrap().result;

        assert_eq!(out.amortization.len(), 6);
        assert_eq!(out.remain_debt, computed.amortization[5].ending_balance);
        assert_eq!(out.write_off_loss, computed.depreciation[5].closing_book_value);
        assert_eq!(out.state.gain_loss, out.remain_debt - out.write_off_loss);
        assert_eq!(out.state.lease_liability, Decimal::ZERO);
        assert_eq!(out.reversed_depreciation, Decimal::ZERO);
        assert!(out.adjustment.is_none());
    }

    #[test]
    fn test_revision_with_cancellation_loss() {
        let computed = recognised();
        let mut c = contract();
        c.cancellation_right = true;
        let old = monthly(12, dec!(10000));
        let mut new = monthly(8, dec!(10000));
        new[7].cancellation_loss = dec!(5000);

        let mut input = input(NaiveDate::from_ymd_opt(2023, 11, 30).unwrap(), &computed);
        input.contract = c;
        input.payment_revision = Some(PaymentRevision { old, new });
        let out = cancel_compute(&input, &config(2023, 9)).unwrap();

        assert_eq!(out.result.cancellation_loss_total, dec!(5000));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_revision_past_cancellation_month_rejected() {
        let computed = recognised();
        let old = monthly(12, dec!(10000));
        let new = monthly(10, dec!(10000));
        let mut input = input(NaiveDate::from_ymd_opt(2023, 11, 30).unwrap(), &computed);
        input.payment_revision = Some(PaymentRevision { old, new });
        assert!(matches!(
            cancel_compute(&input, &config(2023, 9)),
            Err(LeaseError::InvalidCancellationEdit { .. })
        ));
    }

    #[test]
    fn test_cancellation_before_commencement_rejected() {
        let computed = recognised();
        let input = input(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), &computed);
        assert!(cancel_compute(&input, &config(2023, 6)).is_err());
    }
}
