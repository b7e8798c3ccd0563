//! Straight-line depreciation of the right-of-use asset.
//!
//! The depreciation term is sliced into fiscal periods: a first stub running
//! to the next fiscal-year boundary, then whole years, then whatever remains.
//! Each period receives `floor(base × months / remaining)` of the remaining
//! depreciable base, spread over its months by flooring the cumulative share
//! and taking differences so the months of a period always add up to the
//! period allocation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TenantConfig;
use crate::error::LeaseError;
use crate::types::{Money, YearMonth};
use crate::LeaseResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepreciationCategory {
    Ordinary,
    /// Single reconciling line produced by a re-measurement or cancellation
    Adjustment,
}

/// A single month of the depreciation schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepreciationLine {
    pub period_month: YearMonth,
    /// Book value at the start of the line's fiscal period
    pub opening_book_value: Money,
    /// Opening book value less depreciation to date within the period
    pub closing_book_value: Money,
    pub period_depreciation: Money,
    pub category: DepreciationCategory,
}

impl DepreciationLine {
    /// A reconciling line booked on top of `previous_closing`.
    pub fn adjustment(month: YearMonth, previous_closing: Money, amount: Money) -> Self {
        Self {
            period_month: month,
            opening_book_value: previous_closing,
            closing_book_value: previous_closing - amount,
            period_depreciation: amount,
            category: DepreciationCategory::Adjustment,
        }
    }
}

/// Everything one depreciation pass needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepreciationPlan {
    pub opening_book_value: Money,
    pub residual_value: Money,
    /// Months left to depreciate, starting with `start`
    pub total_months: u32,
    pub start: YearMonth,
    pub fiscal_year_start_month: u32,
}

impl DepreciationPlan {
    /// Depreciation from lease commencement, aligned to the tenant's fiscal year.
    pub fn from_commencement(
        opening_book_value: Money,
        residual_value: Money,
        total_months: u32,
        lease_start: NaiveDate,
        config: &TenantConfig,
    ) -> Self {
        Self {
            opening_book_value,
            residual_value,
            total_months,
            start: YearMonth::from_date(lease_start),
            fiscal_year_start_month: config.fiscal_year_start_month,
        }
    }

    /// Depreciation from a comparison-start month; its fiscal years begin
    /// on that month.
    pub fn from_comparison_start(
        opening_book_value: Money,
        residual_value: Money,
        remaining_months: u32,
        comparison_start: YearMonth,
    ) -> Self {
        Self {
            opening_book_value,
            residual_value,
            total_months: remaining_months,
            start: comparison_start,
            fiscal_year_start_month: comparison_start.month(),
        }
    }

    /// Depreciation of a re-measured asset from its first re-measured month.
    pub fn from_remeasurement(
        opening_book_value: Money,
        residual_value: Money,
        remaining_months: u32,
        first_month: YearMonth,
        config: &TenantConfig,
    ) -> Self {
        Self {
            opening_book_value,
            residual_value,
            total_months: remaining_months,
            start: first_month,
            fiscal_year_start_month: config.fiscal_year_start_month,
        }
    }

    pub fn periods(&self) -> FiscalPeriods {
        FiscalPeriods {
            next_start: self.start,
            remaining: self.total_months,
            fiscal_year_start_month: self.fiscal_year_start_month,
            first: true,
        }
    }

    fn validate(&self) -> LeaseResult<()> {
        if !(1..=12).contains(&self.fiscal_year_start_month) {
            return Err(LeaseError::InvalidInput {
                field: "fiscal_year_start_month".into(),
                reason: format!("{} is not a calendar month", self.fiscal_year_start_month),
            });
        }
        if self.opening_book_value < self.residual_value {
            return Err(LeaseError::InvalidInput {
                field: "residual_value".into(),
                reason: format!(
                    "residual value {} exceeds book value {}",
                    self.residual_value, self.opening_book_value
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Period slicing
// ---------------------------------------------------------------------------

/// One fiscal slice of the depreciation term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalPeriod {
    pub start: YearMonth,
    pub months: u32,
    /// Months still to depreciate when this period opens
    pub remaining_months: u32,
}

/// Yields `(start, length)` slices: a stub up to the next fiscal-year
/// boundary, then periods of at most twelve months.
#[derive(Debug, Clone)]
pub struct FiscalPeriods {
    next_start: YearMonth,
    remaining: u32,
    fiscal_year_start_month: u32,
    first: bool,
}

/// Months from `start` up to (not including) the next fiscal-year start, 1..=12.
pub fn months_to_fiscal_boundary(start: YearMonth, fiscal_year_start_month: u32) -> u32 {
    match (fiscal_year_start_month + 12 - start.month()) % 12 {
        0 => 12,
        n => n,
    }
}

impl Iterator for FiscalPeriods {
    type Item = FiscalPeriod;

    fn next(&mut self) -> Option<FiscalPeriod> {
        if self.remaining == 0 {
            return None;
        }
        let span = if self.first {
            months_to_fiscal_boundary(self.next_start, self.fiscal_year_start_month)
        } else {
            12
        };
        let period = FiscalPeriod {
            start: self.next_start,
            months: span.min(self.remaining),
            remaining_months: self.remaining,
        };
        self.first = false;
        self.remaining -= period.months;
        self.next_start = period.start.add_months(i64::from(period.months));
        Some(period)
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Straight-line share of the depreciable base for one period, never more
/// than the whole remaining base.
pub fn allocate_period(
    opening_book_value: Money,
    residual_value: Money,
    remaining_months: u32,
    period_months: u32,
) -> Money {
    if remaining_months == 0 {
        return Decimal::ZERO;
    }
    let base = opening_book_value - residual_value;
    let share = (base * Decimal::from(period_months) / Decimal::from(remaining_months)).floor();
    share.min(base.floor())
}

/// Spread a period allocation over its months: the difference of floored
/// cumulative shares, so the months always sum to `allocation`.
pub fn monthly_amounts(allocation: Money, period_months: u32) -> Vec<Money> {
    let months = Decimal::from(period_months);
    let cumulative = |j: u32| (allocation * Decimal::from(j) / months).floor();
    (1..=period_months)
        .map(|j| cumulative(j) - cumulative(j - 1))
        .collect()
}

/// Build the ordinary depreciation lines of a plan.
pub fn build_depreciation_schedule(plan: &DepreciationPlan) -> LeaseResult<Vec<DepreciationLine>> {
    plan.validate()?;

    let mut schedule = Vec::with_capacity(plan.total_months as usize);
    let mut opening = plan.opening_book_value;

    for period in plan.periods() {
        let allocation = allocate_period(
            opening,
            plan.residual_value,
            period.remaining_months,
            period.months,
        );
        let mut cumulative = Decimal::ZERO;
        for (offset, amount) in monthly_amounts(allocation, period.months).into_iter().enumerate() {
            cumulative += amount;
            schedule.push(DepreciationLine {
                period_month: period.start.add_months(offset as i64),
                opening_book_value: opening,
                closing_book_value: opening - cumulative,
                period_depreciation: amount,
                category: DepreciationCategory::Ordinary,
            });
        }
        opening -= allocation;
    }

    debug!(
        start = %plan.start,
        months = plan.total_months,
        closing = %opening,
        "built depreciation schedule"
    );
    Ok(schedule)
}

pub fn total_depreciation(lines: &[DepreciationLine]) -> Money {
    lines.iter().map(|l| l.period_depreciation).sum()
}
