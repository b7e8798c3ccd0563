//! Lease liability amortization using the effective interest method.
//!
//! Interest is charged monthly at `annual_rate / 12` and truncated to whole
//! units. Months without a cash payment compound interest onto a separate
//! accrual balance; that unpaid interest is recognised with the next payment.
//! The final payment carries a balancing interest figure so the liability
//! closes at exactly zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LeaseError;
use crate::payments::PaymentEntry;
use crate::time_value::{monthly_rate, present_value, validate_rate};
use crate::types::{Money, Rate, YearMonth};
use crate::LeaseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single row of the liability amortization schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationLine {
    /// Month the payment falls in
    pub period_month: YearMonth,
    /// Net cash paid this month
    pub payment: Money,
    /// Liability before this payment
    pub opening_balance: Money,
    /// Interest recognised, including interest accrued over unpaid months
    pub interest: Money,
    /// Reduction of the liability
    pub principal_repayment: Money,
    /// Liability after this payment
    pub ending_balance: Money,
    /// Carry-forward marker: opening balance on the first line of the pass
    /// and at each fiscal-year start month
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening_balance_for_period: Option<Money>,
    /// Present value of this payment measured from the anchor month
    pub present_value: Money,
}

/// Starting point of one amortization pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationParams {
    /// Liability at the beginning of the anchor month
    pub opening_balance: Money,
    pub annual_rate: Rate,
    /// Commencement month, comparison-start month, or first re-measured month
    pub anchor: YearMonth,
    pub fiscal_year_start_month: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Accruing,
    Terminal,
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Build the amortization schedule for normalized payments (at most one per
/// month, in month order, none before the anchor).
pub fn build_amortization_schedule(
    payments: &[PaymentEntry],
    params: &AmortizationParams,
) -> LeaseResult<Vec<AmortizationLine>> {
    if payments.is_empty() {
        return Err(LeaseError::EmptySchedule(
            "amortization needs at least one payment".into(),
        ));
    }
    validate_rate(params.annual_rate)?;

    let rate = monthly_rate(params.annual_rate);
    let last = payments.len() - 1;
    let mut schedule = Vec::with_capacity(payments.len());
    let mut balance = params.opening_balance;
    let mut phase = Phase::Start;
    let mut previous_month = params.anchor;

    for (i, entry) in payments.iter().enumerate() {
        let month = entry.month();
        let gap = previous_month.months_until(month);
        // The anchor month itself is payable; later gaps count whole months between payments.
        let unpaid_months = if phase == Phase::Start { gap } else { gap - 1 };
        if unpaid_months < 0 {
            return Err(LeaseError::InvalidInput {
                field: "payments".into(),
                reason: format!(
                    "payment {} in {month} is not after {previous_month}; normalize the schedule first",
                    entry.sequence_number
                ),
            });
        }
        if i == last {
            phase = Phase::Terminal;
        }

        let mut accrual_balance = balance;
        let mut unpaid_interest = Decimal::ZERO;
        for _ in 0..unpaid_months {
            let accrued = (accrual_balance * rate).floor();
            accrual_balance += accrued;
            unpaid_interest += accrued;
        }

        let payment = entry.net_amount();
        let interest = match phase {
            Phase::Terminal => (payment - balance).floor(),
            _ => (accrual_balance * rate).floor() + unpaid_interest,
        };
        let principal_repayment = (payment - interest).floor();
        let ending_balance = balance - principal_repayment;

        let marks_period = i == 0 || month.month() == params.fiscal_year_start_month;
        schedule.push(AmortizationLine {
            period_month: month,
            payment,
            opening_balance: balance,
            interest,
            principal_repayment,
            ending_balance,
            opening_balance_for_period: marks_period.then_some(balance),
            present_value: present_value(
                payment,
                params.anchor.months_until(month),
                params.annual_rate,
            )?,
        });

        balance = ending_balance;
        previous_month = month;
        if phase == Phase::Start {
            phase = Phase::Accruing;
        }
    }

    debug!(
        anchor = %params.anchor,
        lines = schedule.len(),
        total_interest = %schedule.iter().map(|l| l.interest).sum::<Decimal>(),
        "built amortization schedule"
    );
    Ok(schedule)
}

/// Σ interest and Σ principal of a slice of lines.
pub fn totals(lines: &[AmortizationLine]) -> (Money, Money) {
    lines.iter().fold((Decimal::ZERO, Decimal::ZERO), |(i, p), l| {
        (i + l.interest, p + l.principal_repayment)
    })
}
