//! Lease payment schedules.
//!
//! A schedule is an ordered list of [`PaymentEntry`] rows. Rows are created
//! from contract terms (directly, from persisted [`PaymentRecord`]s, or by
//! [`generate_payments`]) and are never edited in place: a revision is a whole
//! replacement schedule, checked against the old one by `validation`.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LeaseError;
use crate::types::{Money, YearMonth};
use crate::LeaseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    ScheduledPayment,
    ResidualValueGuarantee,
    PurchaseOption,
}

/// One row of a lease payment schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub sequence_number: u32,
    pub kind: PaymentKind,
    pub due_date: NaiveDate,
    pub lease_fee: Money,
    #[serde(default)]
    pub lease_fee_variation: Money,
    /// Incentive received from the lessor, as a positive magnitude
    #[serde(default)]
    pub incentive: Money,
    #[serde(default)]
    pub other_fee: Money,
    /// Penalty payable on early cancellation
    #[serde(default)]
    pub cancellation_loss: Money,
    #[serde(default)]
    pub locked: bool,
}

impl PaymentEntry {
    pub fn scheduled(sequence_number: u32, due_date: NaiveDate, lease_fee: Money) -> Self {
        Self {
            sequence_number,
            kind: PaymentKind::ScheduledPayment,
            due_date,
            lease_fee,
            lease_fee_variation: Decimal::ZERO,
            incentive: Decimal::ZERO,
            other_fee: Decimal::ZERO,
            cancellation_loss: Decimal::ZERO,
            locked: false,
        }
    }

    pub fn month(&self) -> YearMonth {
        YearMonth::from_date(self.due_date)
    }

    /// Cash that enters the liability: `lease_fee − incentive + variation`.
    pub fn net_amount(&self) -> Money {
        self.lease_fee - self.incentive + self.lease_fee_variation
    }

    /// Total of every monetary component; must never be negative.
    pub fn total(&self) -> Money {
        self.lease_fee + self.lease_fee_variation - self.incentive
            + self.other_fee
            + self.cancellation_loss
    }
}

/// Sum of `lease_fee` over the scheduled (non-residual, non-option) rows.
pub fn total_scheduled_fee(entries: &[PaymentEntry]) -> Money {
    entries
        .iter()
        .filter(|e| e.kind == PaymentKind::ScheduledPayment)
        .map(|e| e.lease_fee)
        .sum()
}

// ---------------------------------------------------------------------------
// Persisted rows
// ---------------------------------------------------------------------------

/// A payment row as stored by the host application, with a textual due date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub sequence_number: u32,
    pub kind: PaymentKind,
    pub due_date: String,
    pub lease_fee: Money,
    #[serde(default)]
    pub lease_fee_variation: Money,
    #[serde(default)]
    pub incentive: Money,
    #[serde(default)]
    pub other_fee: Money,
    #[serde(default)]
    pub cancellation_loss: Money,
    #[serde(default)]
    pub locked: bool,
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a due date as `YYYY-MM-DD`, `YYYY/MM/DD` or `YYYY-MM` (first of month).
pub fn parse_due_date(sequence: u32, value: &str) -> LeaseResult<NaiveDate> {
    let trimmed = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    trimmed
        .parse::<YearMonth>()
        .ok()
        .and_then(|m| NaiveDate::from_ymd_opt(m.year(), m.month(), 1))
        .ok_or_else(|| LeaseError::MalformedPaymentDate {
            sequence,
            value: value.to_string(),
        })
}

impl TryFrom<&PaymentRecord> for PaymentEntry {
    type Error = LeaseError;

    fn try_from(record: &PaymentRecord) -> Result<Self, Self::Error> {
        Ok(PaymentEntry {
            sequence_number: record.sequence_number,
            kind: record.kind,
            due_date: parse_due_date(record.sequence_number, &record.due_date)?,
            lease_fee: record.lease_fee,
            lease_fee_variation: record.lease_fee_variation,
            incentive: record.incentive,
            other_fee: record.other_fee,
            cancellation_loss: record.cancellation_loss,
            locked: record.locked,
        })
    }
}

/// Convert persisted rows; the first unparseable date aborts the whole batch.
pub fn parse_records(records: &[PaymentRecord]) -> LeaseResult<Vec<PaymentEntry>> {
    records.iter().map(PaymentEntry::try_from).collect()
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Contract terms from which a regular payment schedule is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub start_date: NaiveDate,
    /// Months between two payments (1 = monthly, 3 = quarterly)
    pub cycle_months: u32,
    /// Day of month the payment falls due; clamped to the month's last day
    pub due_day: u32,
    pub lease_fee: Money,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual_value_guarantee: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_option: Option<Money>,
}

impl PaymentPlan {
    /// Last day covered by the generated schedule.
    pub fn lease_end(&self) -> LeaseResult<NaiveDate> {
        self.count
            .checked_mul(self.cycle_months)
            .and_then(|span| self.start_date.checked_add_months(Months::new(span)))
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| LeaseError::DateError("lease end is out of range".into()))
    }
}

fn due_date_in(month: YearMonth, due_day: u32) -> LeaseResult<NaiveDate> {
    let mut day = due_day.min(31);
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(month.year(), month.month(), day) {
            return Ok(date);
        }
        if day <= 28 {
            return Err(LeaseError::DateError(format!(
                "no due date on day {due_day} of {month}"
            )));
        }
        day -= 1;
    }
}

/// PaymentGenerator: expand a [`PaymentPlan`] into a schedule.
pub fn generate_payments(plan: &PaymentPlan) -> LeaseResult<Vec<PaymentEntry>> {
    if plan.cycle_months == 0 {
        return Err(LeaseError::InvalidInput {
            field: "cycle_months".into(),
            reason: "Payment cycle must be at least one month".into(),
        });
    }
    if plan.count == 0 {
        return Err(LeaseError::InvalidInput {
            field: "count".into(),
            reason: "At least one payment is required".into(),
        });
    }
    if plan.count.checked_mul(plan.cycle_months).is_none() {
        return Err(LeaseError::InvalidInput {
            field: "count".into(),
            reason: "Payment span overflows".into(),
        });
    }
    if !(1..=31).contains(&plan.due_day) {
        return Err(LeaseError::InvalidInput {
            field: "due_day".into(),
            reason: format!("{} is not a day of month", plan.due_day),
        });
    }
    if plan.lease_fee.is_sign_negative() {
        return Err(LeaseError::InvalidInput {
            field: "lease_fee".into(),
            reason: "Lease fee cannot be negative".into(),
        });
    }

    let start_month = YearMonth::from_date(plan.start_date);
    let first_month = if due_date_in(start_month, plan.due_day)? < plan.start_date {
        start_month.next()
    } else {
        start_month
    };

    let mut entries = Vec::with_capacity(plan.count as usize + 1);
    for i in 0..plan.count {
        let month = first_month.add_months(i64::from(i * plan.cycle_months));
        entries.push(PaymentEntry::scheduled(
            i + 1,
            due_date_in(month, plan.due_day)?,
            plan.lease_fee,
        ));
    }

    let terminal = match (plan.residual_value_guarantee, plan.purchase_option) {
        (Some(_), Some(_)) => {
            return Err(LeaseError::InvalidInput {
                field: "purchase_option".into(),
                reason: "A residual value guarantee and a purchase option cannot both be scheduled"
                    .into(),
            })
        }
        (Some(amount), None) => Some((PaymentKind::ResidualValueGuarantee, amount)),
        (None, Some(amount)) => Some((PaymentKind::PurchaseOption, amount)),
        (None, None) => None,
    };

    if let Some((kind, amount)) = terminal {
        let lease_end = plan.lease_end()?;
        if entries.last().is_some_and(|e| e.due_date >= lease_end) {
            return Err(LeaseError::InvalidInput {
                field: "due_day".into(),
                reason: format!("last payment collides with the terminal amount on {lease_end}"),
            });
        }
        let mut entry = PaymentEntry::scheduled(plan.count + 1, lease_end, amount);
        entry.kind = kind;
        entries.push(entry);
    }

    debug!(count = entries.len(), "generated payment schedule");
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// PaymentNormalizer: merge consecutive rows falling in the same calendar month.
///
/// Monetary fields of a run are summed into one row carrying the last row's
/// date, sequence number, kind and lock flag. Rows must be in date order;
/// a row dated before its predecessor aborts with `OutOfOrderPayment`.
pub fn normalize_payments(entries: &[PaymentEntry]) -> LeaseResult<Vec<PaymentEntry>> {
    let mut merged: Vec<PaymentEntry> = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 && entry.due_date < entries[i - 1].due_date {
            return Err(LeaseError::OutOfOrderPayment {
                sequence: entry.sequence_number,
                date: entry.due_date,
                previous: entries[i - 1].due_date,
            });
        }

        match merged.last_mut() {
            Some(last) if last.month() == entry.month() => {
                last.lease_fee += entry.lease_fee;
                last.lease_fee_variation += entry.lease_fee_variation;
                last.incentive += entry.incentive;
                last.other_fee += entry.other_fee;
                last.cancellation_loss += entry.cancellation_loss;
                last.due_date = entry.due_date;
                last.sequence_number = entry.sequence_number;
                last.kind = entry.kind;
                last.locked = entry.locked;
            }
            _ => merged.push(entry.clone()),
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly(count: u32) -> Vec<PaymentEntry> {
        generate_payments(&PaymentPlan {
            start_date: date(2023, 4, 1),
            cycle_months: 1,
            due_day: 25,
            lease_fee: dec!(10000),
            count,
            residual_value_guarantee: None,
            purchase_option: None,
        })
        .unwrap()
    }

    #[test]
    fn test_net_amount_subtracts_incentive() {
        let mut e = PaymentEntry::scheduled(1, date(2023, 4, 25), dec!(10000));
        e.incentive = dec!(1500);
        e.lease_fee_variation = dec!(200);
        assert_eq!(e.net_amount(), dec!(8700));
    }

    #[test]
    fn test_generate_monthly_schedule() {
        let entries = monthly(12);
        assert_eq!(entries.len(), 12);
        assert_eq!(entries[0].due_date, date(2023, 4, 25));
        assert_eq!(entries[11].due_date, date(2024, 3, 25));
        assert_eq!(entries[11].sequence_number, 12);
        assert_eq!(total_scheduled_fee(&entries), dec!(120000));
    }

    #[test]
    fn test_generate_rolls_to_next_month_when_due_day_passed() {
        let entries = generate_payments(&PaymentPlan {
            start_date: date(2023, 4, 26),
            cycle_months: 3,
            due_day: 25,
            lease_fee: dec!(30000),
            count: 4,
            residual_value_guarantee: None,
            purchase_option: None,
        })
        .unwrap();
        assert_eq!(entries[0].due_date, date(2023, 5, 25));
        assert_eq!(entries[1].due_date, date(2023, 8, 25));
        assert_eq!(entries[3].due_date, date(2024, 2, 25));
    }

    #[test]
    fn test_generate_clamps_due_day_to_month_end() {
        let entries = generate_payments(&PaymentPlan {
            start_date: date(2024, 1, 1),
            cycle_months: 1,
            due_day: 31,
            lease_fee: dec!(100),
            count: 3,
            residual_value_guarantee: None,
            purchase_option: None,
        })
        .unwrap();
        assert_eq!(entries[1].due_date, date(2024, 2, 29));
        assert_eq!(entries[2].due_date, date(2024, 3, 31));
    }

    #[test]
    fn test_generate_appends_purchase_option_at_lease_end() {
        let mut plan = PaymentPlan {
            start_date: date(2023, 4, 1),
            cycle_months: 1,
            due_day: 10,
            lease_fee: dec!(1000),
            count: 12,
            residual_value_guarantee: None,
            purchase_option: Some(dec!(5000)),
        };
        let entries = generate_payments(&plan).unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last.kind, PaymentKind::PurchaseOption);
        assert_eq!(last.due_date, date(2024, 3, 31));
        assert_eq!(last.lease_fee, dec!(5000));

        plan.residual_value_guarantee = Some(dec!(1));
        assert!(generate_payments(&plan).is_err());
    }

    #[test]
    fn test_generate_rejects_overflowing_span() {
        let plan = PaymentPlan {
            start_date: date(2023, 4, 1),
            cycle_months: 12,
            due_day: 10,
            lease_fee: dec!(1000),
            count: u32::MAX / 2,
            residual_value_guarantee: None,
            purchase_option: None,
        };
        assert!(matches!(
            generate_payments(&plan),
            Err(LeaseError::InvalidInput { ref field, .. }) if field == "count"
        ));
        assert!(matches!(plan.lease_end(), Err(LeaseError::DateError(_))));
    }

    #[test]
    fn test_normalize_merges_same_month_run() {
        let mut entries = monthly(3);
        let mut extra = PaymentEntry::scheduled(4, date(2023, 5, 28), dec!(500));
        extra.incentive = dec!(100);
        entries.insert(2, extra);

        let merged = normalize_payments(&entries).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].due_date, date(2023, 5, 28));
        assert_eq!(merged[1].lease_fee, dec!(10500));
        assert_eq!(merged[1].incentive, dec!(100));
        assert_eq!(merged[1].sequence_number, 4);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let entries = monthly(6);
        let once = normalize_payments(&entries).unwrap();
        assert_eq!(once, entries);
        assert_eq!(normalize_payments(&once).unwrap(), once);
    }

    #[test]
    fn test_normalize_single_entry_passes_through() {
        let entries = monthly(1);
        assert_eq!(normalize_payments(&entries).unwrap(), entries);
    }

    #[test]
    fn test_normalize_rejects_out_of_order() {
        let mut entries = monthly(3);
        entries.swap(0, 2);
        match normalize_payments(&entries).unwrap_err() {
            LeaseError::OutOfOrderPayment { sequence, .. } => assert_eq!(sequence, 2),
            e => panic!("Expected OutOfOrderPayment, got {e:?}"),
        }
    }

    #[test]
    fn test_parse_records_accepts_known_formats() {
        let record = |seq: u32, due: &str| PaymentRecord {
            sequence_number: seq,
            kind: PaymentKind::ScheduledPayment,
            due_date: due.to_string(),
            lease_fee: dec!(100),
            lease_fee_variation: Decimal::ZERO,
            incentive: Decimal::ZERO,
            other_fee: Decimal::ZERO,
            cancellation_loss: Decimal::ZERO,
            locked: true,
        };
        let parsed = parse_records(&[
            record(1, "2023-04-25"),
            record(2, "2023/05/25"),
            record(3, "2023-06"),
        ])
        .unwrap();
        assert_eq!(parsed[1].due_date, date(2023, 5, 25));
        assert_eq!(parsed[2].due_date, date(2023, 6, 1));
        assert!(parsed[0].locked);

        match parse_records(&[record(1, "2023-04-25"), record(2, "25 May")]).unwrap_err() {
            LeaseError::MalformedPaymentDate { sequence, value } => {
                assert_eq!(sequence, 2);
                assert_eq!(value, "25 May");
            }
            e => panic!("Expected MalformedPaymentDate, got {e:?}"),
        }
    }
}
