use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::LeaseContract;
use crate::config::TenantConfig;
use crate::payments::PaymentEntry;
use crate::types::{Money, YearMonth};

pub fn ym(y: i32, m: u32) -> YearMonth {
    YearMonth::new(y, m).unwrap()
}

pub fn config(y: i32, m: u32) -> TenantConfig {
    TenantConfig {
        minor_lease_threshold: dec!(100000),
        short_lease_threshold_months: 12,
        processing_period: ym(y, m),
        fiscal_year_start_month: 4,
    }
}

/// 36-month lease from 2023-04-01 at 3%.
pub fn contract() -> LeaseContract {
    LeaseContract {
        contract_id: "C-1".into(),
        lease_start: NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
        lease_term_months: 36,
        extension_months: 0,
        annual_rate: dec!(0.03),
        useful_life_months: None,
        ownership_transfer: false,
        residual_value: Decimal::ZERO,
        initial_direct_costs: Decimal::ZERO,
        cancellation_right: false,
        stop_depreciation_at_expiry: false,
    }
}

/// `count` monthly payments due on the 25th from April 2023.
pub fn monthly(count: u32, fee: Money) -> Vec<PaymentEntry> {
    (0..count)
        .map(|i| {
            let m = ym(2023, 4).add_months(i64::from(i));
            PaymentEntry::scheduled(
                i + 1,
                NaiveDate::from_ymd_opt(m.year(), m.month(), 25).unwrap(),
                fee,
            )
        })
        .collect()
}
