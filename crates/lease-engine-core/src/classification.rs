//! Short / minor lease classification and the depreciation term.

use serde::{Deserialize, Serialize};

use crate::config::TenantConfig;
use crate::types::Money;

/// Recognition category of a lease under the tenant's thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseCategory {
    Normal,
    /// Total term at or below the short-lease threshold
    Short,
    /// Total scheduled lease fee at or below the minor-lease threshold
    Minor,
}

impl LeaseCategory {
    /// Short and minor leases may be expensed instead of capitalised.
    pub fn is_exempt(self) -> bool {
        self != LeaseCategory::Normal
    }
}

/// ShortOrMinorLease. The short test runs after the minor test and wins
/// when both apply.
pub fn classify_short_or_minor(
    lease_term_months: u32,
    extension_months: u32,
    payment_total: Money,
    config: &TenantConfig,
) -> LeaseCategory {
    let mut category = LeaseCategory::Normal;
    if payment_total <= config.minor_lease_threshold {
        category = LeaseCategory::Minor;
    }
    if lease_term_months.saturating_add(extension_months) <= config.short_lease_threshold_months {
        category = LeaseCategory::Short;
    }
    category
}

/// Months over which the right-of-use asset is depreciated.
///
/// Ownership-transferring leases use the asset's useful life when known;
/// otherwise the lease term (with extensions) is capped by the useful life.
pub fn depreciation_months(
    lease_term_months: u32,
    extension_months: u32,
    useful_life_months: Option<u32>,
    ownership_transfer: bool,
) -> u32 {
    let term = lease_term_months.saturating_add(extension_months);
    match (ownership_transfer, useful_life_months) {
        (true, Some(life)) => life,
        (false, Some(life)) => term.min(life),
        (_, None) => term,
    }
}
