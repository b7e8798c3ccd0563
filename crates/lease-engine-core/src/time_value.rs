use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::LeaseError;
use crate::payments::PaymentEntry;
use crate::types::{Money, Rate, YearMonth};
use crate::LeaseResult;

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Monthly rate of a monthly-compounded annual discount rate.
pub fn monthly_rate(annual_rate: Rate) -> Rate {
    annual_rate / MONTHS_PER_YEAR
}

pub(crate) fn validate_rate(annual_rate: Rate) -> LeaseResult<()> {
    if annual_rate.is_sign_negative() {
        return Err(LeaseError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Discount rate cannot be negative".into(),
        });
    }
    Ok(())
}

/// Present value of one payment, truncated down to a whole unit:
/// `floor(net / (1 + rate/12)^(months + 1))`.
pub fn present_value(
    net_amount: Money,
    months_from_reference: i64,
    annual_rate: Rate,
) -> LeaseResult<Money> {
    if months_from_reference < 0 {
        return Err(LeaseError::InvalidInput {
            field: "months_from_reference".into(),
            reason: format!(
                "payment falls {} month(s) before the reference date",
                -months_from_reference
            ),
        });
    }
    validate_rate(annual_rate)?;

    let periods = months_from_reference as u64 + 1;
    let factor = (Decimal::ONE + monthly_rate(annual_rate))
        .checked_powu(periods)
        .ok_or_else(|| LeaseError::InvalidInput {
            field: "months_from_reference".into(),
            reason: format!("discount factor over {periods} periods overflows"),
        })?;

    Ok((net_amount / factor).floor())
}

/// Σ of per-payment present values measured from the lease-commencement month.
///
/// Every payment must fall in or after the commencement month.
pub fn pv_from_commencement(
    payments: &[PaymentEntry],
    commencement: YearMonth,
    annual_rate: Rate,
) -> LeaseResult<Money> {
    payments.iter().try_fold(Decimal::ZERO, |acc, p| {
        let months = commencement.months_until(p.month());
        Ok(acc + present_value(p.net_amount(), months, annual_rate)?)
    })
}

/// Σ of per-payment present values measured from a comparison-start month.
///
/// Payments before the comparison month are already settled and are skipped.
pub fn pv_from_comparison_start(
    payments: &[PaymentEntry],
    comparison_start: YearMonth,
    annual_rate: Rate,
) -> LeaseResult<Money> {
    payments
        .iter()
        .filter(|p| p.month() >= comparison_start)
        .try_fold(Decimal::ZERO, |acc, p| {
            let months = comparison_start.months_until(p.month());
            Ok(acc + present_value(p.net_amount(), months, annual_rate)?)
        })
}
