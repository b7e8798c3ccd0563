use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use lease_engine_core::classification::classify_short_or_minor;
use lease_engine_core::config::{config_from_json, TenantConfig};
use lease_engine_core::lifecycle::{self, LeaseContract};
use lease_engine_core::payments::{self, total_scheduled_fee, PaymentEntry};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse<T: for<'de> Deserialize<'de>>(json: &str) -> NapiResult<T> {
    serde_json::from_str(json).map_err(to_napi_error)
}

fn tenant_config(config_json: &str) -> NapiResult<TenantConfig> {
    config_from_json(config_json).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Lifecycle operations
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_lease(input_json: String, config_json: String) -> NapiResult<String> {
    let input: lifecycle::ComputeInput = parse(&input_json)?;
    let output = lifecycle::compute(&input, &tenant_config(&config_json)?).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn change_compute(input_json: String) -> NapiResult<String> {
    let input: lifecycle::ChangeComputeInput = parse(&input_json)?;
    let output = lifecycle::change_compute(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn debt_compute(input_json: String, config_json: String) -> NapiResult<String> {
    let input: lifecycle::DebtComputeInput = parse(&input_json)?;
    let output =
        lifecycle::debt_compute(&input, &tenant_config(&config_json)?).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn cancel_compute(input_json: String, config_json: String) -> NapiResult<String> {
    let input: lifecycle::CancelComputeInput = parse(&input_json)?;
    let output =
        lifecycle::cancel_compute(&input, &tenant_config(&config_json)?).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn expire_compute(input_json: String) -> NapiResult<String> {
    let input: lifecycle::ExpireComputeInput = parse(&input_json)?;
    let output = lifecycle::expire_compute(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Payment schedules
// ---------------------------------------------------------------------------

#[napi]
pub fn generate_payments(plan_json: String) -> NapiResult<String> {
    let plan: payments::PaymentPlan = parse(&plan_json)?;
    let entries = payments::generate_payments(&plan).map_err(to_napi_error)?;
    serde_json::to_string(&entries).map_err(to_napi_error)
}

#[napi]
pub fn normalize_payments(records_json: String) -> NapiResult<String> {
    let records: Vec<payments::PaymentRecord> = parse(&records_json)?;
    let entries = payments::parse_records(&records).map_err(to_napi_error)?;
    let normalized = payments::normalize_payments(&entries).map_err(to_napi_error)?;
    serde_json::to_string(&normalized).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct ClassifyRequest {
    contract: LeaseContract,
    payments: Vec<PaymentEntry>,
}

/// Returns `"normal"`, `"short"` or `"minor"`.
#[napi]
pub fn classify_lease(input_json: String, config_json: String) -> NapiResult<String> {
    let request: ClassifyRequest = parse(&input_json)?;
    let category = classify_short_or_minor(
        request.contract.lease_term_months,
        request.contract.extension_months,
        total_scheduled_fee(&request.payments),
        &tenant_config(&config_json)?,
    );
    serde_json::to_string(&category).map_err(to_napi_error)
}
