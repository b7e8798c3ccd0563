use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use lease_engine_core::classification::{
    classify_short_or_minor, depreciation_months, LeaseCategory,
};
use lease_engine_core::config::TenantConfigSource;
use lease_engine_core::payments::{
    generate_payments, normalize_payments, parse_records, total_scheduled_fee, PaymentEntry,
    PaymentPlan, PaymentRecord,
};
use lease_engine_core::types::{with_metadata, Money};

use crate::input;
use crate::tenant;
use crate::TenantArgs;

/// Arguments for commands that read one JSON document
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Deserialize, Serialize)]
struct ClassifyInput {
    lease_term_months: u32,
    #[serde(default)]
    extension_months: u32,
    #[serde(default)]
    useful_life_months: Option<u32>,
    #[serde(default)]
    ownership_transfer: bool,
    payments: Vec<PaymentEntry>,
}

#[derive(Serialize)]
struct ClassifyOutput {
    category: LeaseCategory,
    exempt: bool,
    payment_total: Money,
    depreciation_months: u32,
}

pub fn run_classify(
    args: ScheduleArgs,
    tenant_args: &TenantArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let classify_input: ClassifyInput = input::read_input(args.input.as_deref(), "classify")?;
    let key = tenant_args.key();
    let config = tenant::load_source(tenant_args.config.as_deref(), &key)?
        .tenant_config(&key.tenant_id, &key.app_id)?;
    config.validate()?;

    let payment_total = total_scheduled_fee(&classify_input.payments);
    let category = classify_short_or_minor(
        classify_input.lease_term_months,
        classify_input.extension_months,
        payment_total,
        &config,
    );
    let output = ClassifyOutput {
        category,
        exempt: category.is_exempt(),
        payment_total,
        depreciation_months: depreciation_months(
            classify_input.lease_term_months,
            classify_input.extension_months,
            classify_input.useful_life_months,
            classify_input.ownership_transfer,
        ),
    };
    let result = with_metadata(
        "Short lease by total term, minor lease by total scheduled fee; short takes precedence",
        &classify_input,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        output,
    );
    Ok(serde_json::to_value(result)?)
}

pub fn run_generate(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let plan: PaymentPlan = input::read_input(args.input.as_deref(), "generate")?;
    let entries = generate_payments(&plan)?;
    Ok(serde_json::to_value(entries)?)
}

/// Normalize stored payment rows (textual due dates accepted).
pub fn run_normalize(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let records: Vec<PaymentRecord> = input::read_input(args.input.as_deref(), "normalize")?;
    let entries = parse_records(&records)?;
    let normalized = normalize_payments(&entries)?;
    Ok(serde_json::to_value(normalized)?)
}
