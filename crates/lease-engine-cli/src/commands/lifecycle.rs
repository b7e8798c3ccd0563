use clap::Args;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use lease_engine_core::config::StaticConfigSource;
use lease_engine_core::engine::{EngineRun, LeaseEngine, TenantKey};
use lease_engine_core::lifecycle::{
    CancelComputeInput, ChangeComputeInput, ComputeInput, DebtComputeInput, ExpireComputeInput,
};
use lease_engine_core::LeaseResult;

use crate::input;
use crate::sink::CliSink;
use crate::tenant;
use crate::TenantArgs;

/// Arguments shared by every lifecycle operation
#[derive(Args)]
pub struct OperationArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Append the line-item bundle to this JSON-lines file
    #[arg(long)]
    pub persist: Option<String>,

    /// Print the line-item bundle alongside the result
    #[arg(long)]
    pub bundle: bool,
}

type CliEngine = LeaseEngine<StaticConfigSource, CliSink>;

fn run_operation<I, T, F>(
    args: OperationArgs,
    tenant_args: &TenantArgs,
    what: &str,
    operation: F,
) -> Result<Value, Box<dyn std::error::Error>>
where
    I: DeserializeOwned,
    T: Serialize,
    F: FnOnce(&mut CliEngine, &TenantKey, &I, bool) -> LeaseResult<EngineRun<T>>,
{
    let operation_input: I = input::read_input(args.input.as_deref(), what)?;
    let key = tenant_args.key();
    let source = tenant::load_source(tenant_args.config.as_deref(), &key)?;
    let sink = CliSink::open(args.persist.as_deref())?;
    let insert = sink.persists();
    debug!(
        operation = what,
        tenant = %key.tenant_id,
        app = %key.app_id,
        insert,
        "running lifecycle operation"
    );
    let mut engine = LeaseEngine::new(source, sink);

    let run = operation(&mut engine, &key, &operation_input, insert)?;
    if args.bundle {
        Ok(serde_json::to_value(run)?)
    } else {
        Ok(serde_json::to_value(run.output)?)
    }
}

pub fn run_compute(
    args: OperationArgs,
    tenant_args: &TenantArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    run_operation::<ComputeInput, _, _>(
        args,
        tenant_args,
        "compute",
        |engine, key, input, insert| engine.compute(key, input, insert),
    )
}

pub fn run_change(
    args: OperationArgs,
    tenant_args: &TenantArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    run_operation::<ChangeComputeInput, _, _>(
        args,
        tenant_args,
        "change",
        |engine, key, input, insert| engine.change_compute(key, input, insert),
    )
}

pub fn run_debt(
    args: OperationArgs,
    tenant_args: &TenantArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    run_operation::<DebtComputeInput, _, _>(
        args,
        tenant_args,
        "debt",
        |engine, key, input, insert| engine.debt_compute(key, input, insert),
    )
}

pub fn run_cancel(
    args: OperationArgs,
    tenant_args: &TenantArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    run_operation::<CancelComputeInput, _, _>(
        args,
        tenant_args,
        "cancel",
        |engine, key, input, insert| engine.cancel_compute(key, input, insert),
    )
}

pub fn run_expire(
    args: OperationArgs,
    tenant_args: &TenantArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    run_operation::<ExpireComputeInput, _, _>(
        args,
        tenant_args,
        "expire",
        |engine, key, input, insert| engine.expire_compute(key, input, insert),
    )
}
