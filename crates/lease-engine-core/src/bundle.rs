//! Line-item bundles handed to the caller's store.
//!
//! Every lifecycle run produces one [`LineItemBundle`]: the payment,
//! amortization and depreciation rows plus a single summary row, tagged
//! with a fresh batch id. Persisting it is the caller's business, through
//! any [`LineItemSink`].

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::amortization::{totals, AmortizationLine};
use crate::depreciation::{total_depreciation, DepreciationLine};
use crate::lifecycle::{
    CancelComputeOutput, ChangeComputeOutput, ComputeOutput, ContractFinancialState,
    DebtComputeOutput, ExpireComputeOutput,
};
use crate::payments::PaymentEntry;
use crate::types::Money;
use crate::LeaseResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Compute,
    ChangeCompute,
    DebtCompute,
    CancelCompute,
    ExpireCompute,
}

/// Disclosure row closing every bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ContractFinancialState>,
    pub total_interest: Money,
    pub total_depreciation: Money,
    pub disclosures: BTreeMap<String, Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemBundle {
    pub batch_id: Uuid,
    pub contract_id: String,
    pub operation: Operation,
    pub payment_lines: Vec<PaymentEntry>,
    pub amortization_lines: Vec<AmortizationLine>,
    pub depreciation_lines: Vec<DepreciationLine>,
    pub summary: SummaryLine,
}

impl LineItemBundle {
    fn new(
        contract_id: &str,
        operation: Operation,
        state: Option<ContractFinancialState>,
        payment_lines: Vec<PaymentEntry>,
        amortization_lines: Vec<AmortizationLine>,
        depreciation_lines: Vec<DepreciationLine>,
    ) -> Self {
        let (total_interest, _) = totals(&amortization_lines);
        let summary = SummaryLine {
            operation,
            state,
            total_interest,
            total_depreciation: total_depreciation(&depreciation_lines),
            disclosures: BTreeMap::new(),
        };
        Self {
            batch_id: Uuid::new_v4(),
            contract_id: contract_id.to_string(),
            operation,
            payment_lines,
            amortization_lines,
            depreciation_lines,
            summary,
        }
    }

    fn disclose(mut self, name: &str, amount: Money) -> Self {
        self.summary.disclosures.insert(name.to_string(), amount);
        self
    }

    /// Rows a store receives, summary included.
    pub fn record_count(&self) -> usize {
        self.payment_lines.len() + self.amortization_lines.len() + self.depreciation_lines.len() + 1
    }
}

/// Operation outputs that can be laid out as line items.
pub trait IntoLineItems {
    fn to_line_items(&self, contract_id: &str) -> LineItemBundle;
}

impl IntoLineItems for ComputeOutput {
    fn to_line_items(&self, contract_id: &str) -> LineItemBundle {
        let bundle = LineItemBundle::new(
            contract_id,
            Operation::Compute,
            Some(self.state.clone()),
            self.payments.clone(),
            self.amortization.clone(),
            self.depreciation.clone(),
        );
        match &self.comparison {
            Some(c) => bundle
                .disclose("present_value_at_comparison", c.present_value)
                .disclose("rou_asset_at_comparison", c.rou_asset),
            None => bundle,
        }
    }
}

impl IntoLineItems for ChangeComputeOutput {
    fn to_line_items(&self, contract_id: &str) -> LineItemBundle {
        LineItemBundle::new(
            contract_id,
            Operation::ChangeCompute,
            None,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
        .disclose("future_interest", self.future_interest)
        .disclose("future_principal", self.future_principal)
        .disclose("future_payments", self.future_payments)
        .disclose("elapsed_depreciation", self.elapsed_depreciation)
        .disclose("liability_at_change", self.liability_at_change)
        .disclose("book_value_at_change", self.book_value_at_change)
    }
}

impl IntoLineItems for DebtComputeOutput {
    fn to_line_items(&self, contract_id: &str) -> LineItemBundle {
        LineItemBundle::new(
            contract_id,
            Operation::DebtCompute,
            Some(self.state.clone()),
            self.payments.clone(),
            self.amortization.clone(),
            self.depreciation.clone(),
        )
        .disclose("liability_before", self.liability_before)
        .disclose("asset_before", self.asset_before)
        .disclose("reduced_liability", self.reduced_liability)
        .disclose("reduced_asset", self.reduced_asset)
        .disclose("unrecognized_financing_cost", self.unrecognized_financing_cost)
        .disclose(
            "depreciation_adjustment",
            self.adjustment
                .as_ref()
                .map_or(Decimal::ZERO, |a| a.period_depreciation),
        )
    }
}

impl IntoLineItems for CancelComputeOutput {
    fn to_line_items(&self, contract_id: &str) -> LineItemBundle {
        LineItemBundle::new(
            contract_id,
            Operation::CancelCompute,
            Some(self.state.clone()),
            Vec::new(),
            self.amortization.clone(),
            self.depreciation.clone(),
        )
        .disclose("remain_debt", self.remain_debt)
        .disclose("write_off_loss", self.write_off_loss)
        .disclose("reversed_depreciation", self.reversed_depreciation)
        .disclose("cancellation_loss", self.cancellation_loss_total)
    }
}

impl IntoLineItems for ExpireComputeOutput {
    fn to_line_items(&self, contract_id: &str) -> LineItemBundle {
        LineItemBundle::new(
            contract_id,
            Operation::ExpireCompute,
            None,
            Vec::new(),
            Vec::new(),
            self.depreciation.clone(),
        )
        .disclose("residual_book_value", self.residual_book_value)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Generic "insert many records" store.
pub trait LineItemSink {
    fn insert_many(&mut self, bundle: &LineItemBundle) -> LeaseResult<()>;
}

/// Keeps bundles in memory; used for previews and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    bundles: Vec<LineItemBundle>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundles(&self) -> &[LineItemBundle] {
        &self.bundles
    }
}

impl LineItemSink for MemorySink {
    fn insert_many(&mut self, bundle: &LineItemBundle) -> LeaseResult<()> {
        debug!(batch = %bundle.batch_id, records = bundle.record_count(), "bundle stored");
        self.bundles.push(bundle.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::fixtures::{config, contract, monthly};
    use crate::lifecycle::{compute, ComputeInput, Measurement};
    use rust_decimal_macros::dec;

    fn computed() -> ComputeOutput {
        compute(
            &ComputeInput {
                contract: contract(),
                payments: monthly(12, dec!(10000)),
                measurement: Measurement::FromInception,
            },
            &config(2023, 6),
        )
        .unwrap()
        .result
    }

    #[test]
    fn test_compute_bundle_carries_every_line() {
        let out = computed();
        let bundle = out.to_line_items("C-1");
        assert_eq!(bundle.operation, Operation::Compute);
        assert_eq!(bundle.payment_lines.len(), 12);
        assert_eq!(bundle.amortization_lines.len(), 12);
        assert_eq!(bundle.depreciation_lines.len(), 36);
        assert_eq!(bundle.record_count(), 61);
        assert_eq!(bundle.summary.total_interest, dec!(120000) - dec!(118067));
        assert_eq!(bundle.summary.total_depreciation, dec!(118067));
        assert_eq!(bundle.summary.state, Some(out.state));
    }

    #[test]
    fn test_each_bundle_gets_its_own_batch_id() {
        let out = computed();
        assert_ne!(
            out.to_line_items("C-1").batch_id,
            out.to_line_items("C-1").batch_id
        );
    }

    #[test]
    fn test_memory_sink_keeps_bundles() {
        let mut sink = MemorySink::new();
        let bundle = computed().to_line_items("C-1");
        sink.insert_many(&bundle).unwrap();
        assert_eq!(sink.bundles().len(), 1);
        assert_eq!(sink.bundles()[0].batch_id, bundle.batch_id);
    }
}
