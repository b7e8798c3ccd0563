//! Legality checks over payment schedules.
//!
//! `validate_pay_data` checks a single schedule. `validate_pay_changeable`
//! and `validate_cancellation_pay_data` compare an old schedule with its
//! replacement and refuse edits that reach into locked months. Comparisons
//! are field by field with the `locked` flag masked, and report the first
//! divergence found.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use tracing::warn;

use crate::error::LeaseError;
use crate::payments::{PaymentEntry, PaymentKind};
use crate::types::YearMonth;
use crate::LeaseResult;

// ---------------------------------------------------------------------------
// Field comparison
// ---------------------------------------------------------------------------

/// Which fields take part in an old/new comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    AllFields,
    LeaseFeeOnly,
    IgnoringCancellationLoss,
}

/// First position at which two schedules disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub index: usize,
    pub sequence: u32,
    pub field: &'static str,
}

fn field_mismatch(
    a: &PaymentEntry,
    b: &PaymentEntry,
    comparison: Comparison,
) -> Option<&'static str> {
    if comparison == Comparison::LeaseFeeOnly {
        return (a.lease_fee != b.lease_fee).then_some("lease_fee");
    }
    if a.sequence_number != b.sequence_number {
        return Some("sequence_number");
    }
    if a.kind != b.kind {
        return Some("kind");
    }
    if a.due_date != b.due_date {
        return Some("due_date");
    }
    if a.lease_fee != b.lease_fee {
        return Some("lease_fee");
    }
    if a.lease_fee_variation != b.lease_fee_variation {
        return Some("lease_fee_variation");
    }
    if a.incentive != b.incentive {
        return Some("incentive");
    }
    if a.other_fee != b.other_fee {
        return Some("other_fee");
    }
    if comparison == Comparison::AllFields && a.cancellation_loss != b.cancellation_loss {
        return Some("cancellation_loss");
    }
    None
}

pub fn first_divergence(
    old: &[&PaymentEntry],
    new: &[&PaymentEntry],
    comparison: Comparison,
) -> Option<Divergence> {
    for (index, (a, b)) in old.iter().zip(new.iter()).enumerate() {
        if let Some(field) = field_mismatch(a, b, comparison) {
            return Some(Divergence {
                index,
                sequence: b.sequence_number,
                field,
            });
        }
    }
    if old.len() != new.len() {
        let index = old.len().min(new.len());
        let sequence = old
            .get(index)
            .or_else(|| new.get(index))
            .map_or(0, |e| e.sequence_number);
        return Some(Divergence {
            index,
            sequence,
            field: "entry",
        });
    }
    None
}

fn select(entries: &[PaymentEntry], keep: impl Fn(YearMonth) -> bool) -> Vec<&PaymentEntry> {
    entries.iter().filter(|e| keep(e.month())).collect()
}

// ---------------------------------------------------------------------------
// PayDataValidity
// ---------------------------------------------------------------------------

/// Check ordering, uniqueness and amount rules of a single schedule.
pub fn validate_pay_data(payments: &[PaymentEntry], cancellation_right: bool) -> LeaseResult<()> {
    check_pay_data(payments, cancellation_right)
        .inspect_err(|e| warn!(error = %e, "payment schedule rejected"))
}

fn check_pay_data(payments: &[PaymentEntry], cancellation_right: bool) -> LeaseResult<()> {
    if payments.is_empty() {
        return Err(LeaseError::EmptySchedule(
            "at least one payment is required".into(),
        ));
    }

    for pair in payments.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.due_date == prev.due_date {
            return Err(LeaseError::DuplicateDate { date: cur.due_date });
        }
        // Dates are unique, so the sequence number never decides the order.
        if cur.due_date < prev.due_date {
            return Err(LeaseError::OrderingError {
                sequence: cur.sequence_number,
            });
        }
    }

    for entry in payments {
        let total = entry.total();
        if total.is_sign_negative() && !total.is_zero() {
            return Err(LeaseError::NegativeTotal {
                sequence: entry.sequence_number,
                total,
            });
        }
        if entry.kind == PaymentKind::ScheduledPayment
            && entry.lease_fee.is_zero()
            && entry.lease_fee_variation.is_zero()
            && entry.incentive.is_zero()
        {
            return Err(LeaseError::AllZeroAmounts {
                sequence: entry.sequence_number,
            });
        }
        if entry.cancellation_loss.is_sign_negative() && !entry.cancellation_loss.is_zero() {
            return Err(LeaseError::NegativeCancellationLoss {
                sequence: entry.sequence_number,
            });
        }
    }

    let loss_total: Decimal = payments.iter().map(|e| e.cancellation_loss).sum();
    if !loss_total.is_zero() && !cancellation_right {
        return Err(LeaseError::CancellationLossNotAllowed { total: loss_total });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// PayChangeable
// ---------------------------------------------------------------------------

/// Refuse a replacement schedule that edits locked months.
///
/// Entries at or before `change_month` must be identical; entries at or
/// before `processing_month` must keep their lease fee.
pub fn validate_pay_changeable(
    old: &[PaymentEntry],
    new: &[PaymentEntry],
    change_month: YearMonth,
    processing_month: YearMonth,
) -> LeaseResult<()> {
    let before_change = |m: YearMonth| m <= change_month;
    if let Some(d) = first_divergence(
        &select(old, before_change),
        &select(new, before_change),
        Comparison::AllFields,
    ) {
        warn!(
            boundary = %change_month,
            sequence = d.sequence,
            field = d.field,
            "locked payment edited"
        );
        return Err(LeaseError::LockedPeriodEdited {
            boundary: change_month,
            sequence: d.sequence,
            field: d.field,
        });
    }

    let processed = |m: YearMonth| m <= processing_month;
    if let Some(d) = first_divergence(
        &select(old, processed),
        &select(new, processed),
        Comparison::LeaseFeeOnly,
    ) {
        warn!(
            boundary = %processing_month,
            sequence = d.sequence,
            field = d.field,
            "processed payment edited"
        );
        return Err(LeaseError::LockedPeriodEdited {
            boundary: processing_month,
            sequence: d.sequence,
            field: d.field,
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// CancellationPayData
// ---------------------------------------------------------------------------

/// Refuse a cancellation schedule that rewrites history or runs past the
/// cancellation month.
///
/// Months before the processing month (and not after the cancellation) must
/// be unchanged. Months from the processing month up to the cancellation
/// month may only differ in `cancellation_loss`.
pub fn validate_cancellation_pay_data(
    old: &[PaymentEntry],
    new: &[PaymentEntry],
    processing_month: YearMonth,
    cancellation_month: YearMonth,
) -> LeaseResult<()> {
    check_cancellation_pay_data(old, new, processing_month, cancellation_month)
        .inspect_err(|e| warn!(error = %e, "cancellation schedule rejected"))
}

fn check_cancellation_pay_data(
    old: &[PaymentEntry],
    new: &[PaymentEntry],
    processing_month: YearMonth,
    cancellation_month: YearMonth,
) -> LeaseResult<()> {
    if let Some(late) = new.iter().find(|e| e.month() > cancellation_month) {
        return Err(LeaseError::InvalidCancellationEdit {
            boundary: cancellation_month,
            reason: format!(
                "payment {} is due after the cancellation month",
                late.sequence_number
            ),
        });
    }

    let elapsed = |m: YearMonth| m < processing_month && m <= cancellation_month;
    if let Some(d) = first_divergence(
        &select(old, elapsed),
        &select(new, elapsed),
        Comparison::AllFields,
    ) {
        return Err(LeaseError::InvalidCancellationEdit {
            boundary: processing_month,
            reason: format!(
                "payment {} changes '{}' in an elapsed month",
                d.sequence, d.field
            ),
        });
    }

    let pending = |m: YearMonth| m >= processing_month && m <= cancellation_month;
    if let Some(d) = first_divergence(
        &select(old, pending),
        &select(new, pending),
        Comparison::IgnoringCancellationLoss,
    ) {
        return Err(LeaseError::InvalidCancellationEdit {
            boundary: cancellation_month,
            reason: format!(
                "payment {} changes '{}' before cancellation",
                d.sequence, d.field
            ),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// ExpireDateConsistency
// ---------------------------------------------------------------------------

/// Lease expiry date: `lease_start + (term + extension)` months.
pub fn expiry_date(
    lease_start: NaiveDate,
    lease_term_months: u32,
    extension_months: u32,
) -> LeaseResult<NaiveDate> {
    let months = lease_term_months
        .checked_add(extension_months)
        .ok_or_else(|| LeaseError::InvalidInput {
            field: "extension_months".into(),
            reason: "Lease term plus extension overflows".into(),
        })?;
    lease_start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| LeaseError::DateError("lease expiry is out of range".into()))
}

/// The last payment may not fall after the lease expires.
pub fn validate_expire_date(
    lease_start: NaiveDate,
    lease_term_months: u32,
    extension_months: u32,
    payments: &[PaymentEntry],
) -> LeaseResult<NaiveDate> {
    let expiry = expiry_date(lease_start, lease_term_months, extension_months)?;
    if let Some(last) = payments.iter().map(|e| e.due_date).max() {
        if expiry < last {
            warn!(%expiry, %last, "lease expires before its last payment");
            return Err(LeaseError::ExpiryBeforeLastPayment {
                expiry,
                last_payment: last,
            });
        }
    }
    Ok(expiry)
}
