//! Tenant configuration consumed by every lifecycle operation.
//!
//! The engine never fetches configuration in the middle of a computation:
//! callers resolve a [`TenantConfig`] once (through a [`TenantConfigSource`])
//! and pass it by reference into the operation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::LeaseError;
use crate::types::{Money, YearMonth};
use crate::LeaseResult;

/// Per-tenant accounting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Leases whose total scheduled fee is at or below this are "minor"
    pub minor_lease_threshold: Money,
    /// Leases whose total term is at or below this many months are "short"
    pub short_lease_threshold_months: u32,
    /// Current accounting close period; data at or before it is locked
    pub processing_period: YearMonth,
    /// First month of the fiscal year (1 = January)
    pub fiscal_year_start_month: u32,
}

impl TenantConfig {
    pub fn validate(&self) -> LeaseResult<()> {
        if !(1..=12).contains(&self.fiscal_year_start_month) {
            return Err(LeaseError::InvalidInput {
                field: "fiscal_year_start_month".into(),
                reason: format!("{} is not a calendar month", self.fiscal_year_start_month),
            });
        }
        if self.minor_lease_threshold.is_sign_negative() {
            return Err(LeaseError::InvalidInput {
                field: "minor_lease_threshold".into(),
                reason: "Threshold cannot be negative".into(),
            });
        }
        Ok(())
    }
}

/// `GetTenantConfig(tenantId, appId)`: the engine's only external read.
///
/// Implementations must be safe to call concurrently; failures are reported
/// as [`LeaseError::ConfigUnavailable`] and are never retried by the engine.
pub trait TenantConfigSource {
    fn tenant_config(&self, tenant_id: &str, app_id: &str) -> LeaseResult<TenantConfig>;
}

/// In-memory source keyed by `(tenant_id, app_id)`.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    entries: HashMap<(String, String), TenantConfig>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant_id: &str, app_id: &str, config: TenantConfig) -> Self {
        self.entries
            .insert((tenant_id.to_string(), app_id.to_string()), config);
        self
    }
}

impl TenantConfigSource for StaticConfigSource {
    fn tenant_config(&self, tenant_id: &str, app_id: &str) -> LeaseResult<TenantConfig> {
        self.entries
            .get(&(tenant_id.to_string(), app_id.to_string()))
            .cloned()
            .ok_or_else(|| LeaseError::ConfigUnavailable {
                tenant_id: tenant_id.to_string(),
                app_id: app_id.to_string(),
                reason: "no configuration registered".into(),
            })
    }
}

/// Parse a tenant configuration from JSON text and validate it.
pub fn config_from_json(text: &str) -> LeaseResult<TenantConfig> {
    let config: TenantConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}
