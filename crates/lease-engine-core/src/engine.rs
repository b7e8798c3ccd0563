//! Facade that resolves tenant configuration, runs an operation and hands
//! the resulting bundle to a sink.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::bundle::{IntoLineItems, LineItemBundle, LineItemSink};
use crate::config::{TenantConfig, TenantConfigSource};
use crate::lifecycle::{
    cancel_compute, change_compute, compute, debt_compute, expire_compute, CancelComputeInput,
    CancelComputeOutput, ChangeComputeInput, ChangeComputeOutput, ComputeInput, ComputeOutput,
    DebtComputeInput, DebtComputeOutput, ExpireComputeInput, ExpireComputeOutput,
};
use crate::types::ComputationOutput;
use crate::LeaseResult;

/// Identifies whose configuration applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantKey {
    pub tenant_id: String,
    pub app_id: String,
}

impl TenantKey {
    pub fn new(tenant_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            app_id: app_id.into(),
        }
    }
}

/// Result of one engine call.
#[derive(Debug, Clone, Serialize)]
pub struct EngineRun<T: Serialize> {
    pub output: ComputationOutput<T>,
    pub bundle: LineItemBundle,
    /// Whether the bundle was written to the sink
    pub persisted: bool,
}

pub struct LeaseEngine<C, S> {
    config_source: C,
    sink: S,
}

impl<C: TenantConfigSource, S: LineItemSink> LeaseEngine<C, S> {
    pub fn new(config_source: C, sink: S) -> Self {
        Self {
            config_source,
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Fetch and validate the tenant configuration. Failures propagate
    /// unchanged.
    pub fn tenant_config(&self, tenant: &TenantKey) -> LeaseResult<TenantConfig> {
        let config = self
            .config_source
            .tenant_config(&tenant.tenant_id, &tenant.app_id)?;
        config.validate()?;
        Ok(config)
    }

    pub fn compute(
        &mut self,
        tenant: &TenantKey,
        input: &ComputeInput,
        insert: bool,
    ) -> LeaseResult<EngineRun<ComputeOutput>> {
        let config = self.tenant_config(tenant)?;
        let output = compute(input, &config)?;
        self.finish(&input.contract.contract_id, output, insert)
    }

    pub fn change_compute(
        &mut self,
        tenant: &TenantKey,
        input: &ChangeComputeInput,
        insert: bool,
    ) -> LeaseResult<EngineRun<ChangeComputeOutput>> {
        self.tenant_config(tenant)?;
        let output = change_compute(input)?;
        self.finish(&input.contract_id, output, insert)
    }

    pub fn debt_compute(
        &mut self,
        tenant: &TenantKey,
        input: &DebtComputeInput,
        insert: bool,
    ) -> LeaseResult<EngineRun<DebtComputeOutput>> {
        let config = self.tenant_config(tenant)?;
        let output = debt_compute(input, &config)?;
        self.finish(&input.contract.contract_id, output, insert)
    }

    pub fn cancel_compute(
        &mut self,
        tenant: &TenantKey,
        input: &CancelComputeInput,
        insert: bool,
    ) -> LeaseResult<EngineRun<CancelComputeOutput>> {
        let config = self.tenant_config(tenant)?;
        let output = cancel_compute(input, &config)?;
        self.finish(&input.contract.contract_id, output, insert)
    }

    pub fn expire_compute(
        &mut self,
        tenant: &TenantKey,
        input: &ExpireComputeInput,
        insert: bool,
    ) -> LeaseResult<EngineRun<ExpireComputeOutput>> {
        self.tenant_config(tenant)?;
        let output = expire_compute(input)?;
        self.finish(&input.contract.contract_id, output, insert)
    }

    #[instrument(skip(self, output))]
    fn finish<T: IntoLineItems + Serialize>(
        &mut self,
        contract_id: &str,
        output: ComputationOutput<T>,
        insert: bool,
    ) -> LeaseResult<EngineRun<T>> {
        let bundle = output.result.to_line_items(contract_id);
        if insert {
            self.sink.insert_many(&bundle)?;
            info!(batch = %bundle.batch_id, records = bundle.record_count(), "line items persisted");
        }
        Ok(EngineRun {
            output,
            bundle,
            persisted: insert,
        })
    }
}
