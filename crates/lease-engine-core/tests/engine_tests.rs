use chrono::NaiveDate;
use lease_engine_core::bundle::{LineItemBundle, LineItemSink, MemorySink, Operation};
use lease_engine_core::config::{StaticConfigSource, TenantConfig};
use lease_engine_core::engine::{LeaseEngine, TenantKey};
use lease_engine_core::lifecycle::{
    ChangeComputeInput, ComputeInput, ExpireComputeInput, LeaseContract, Measurement,
};
use lease_engine_core::payments::PaymentEntry;
use lease_engine_core::{LeaseError, LeaseResult, YearMonth};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn tenant_config() -> TenantConfig {
    TenantConfig {
        minor_lease_threshold: dec!(100000),
        short_lease_threshold_months: 12,
        processing_period: YearMonth::new(2023, 6).unwrap(),
        fiscal_year_start_month: 4,
    }
}

fn engine<S: LineItemSink>(sink: S) -> LeaseEngine<StaticConfigSource, S> {
    let source = StaticConfigSource::new().with_tenant("acme", "lease", tenant_config());
    LeaseEngine::new(source, sink)
}

fn tenant() -> TenantKey {
    TenantKey::new("acme", "lease")
}

fn compute_input() -> ComputeInput {
    let payments = (0..12u32)
        .map(|i| {
            let m = YearMonth::new(2023, 4).unwrap().add_months(i64::from(i));
            PaymentEntry::scheduled(
                i + 1,
                NaiveDate::from_ymd_opt(m.year(), m.month(), 25).unwrap(),
                dec!(10000),
            )
        })
        .collect();
    ComputeInput {
        contract: LeaseContract {
            contract_id: "L-77".into(),
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
        },
        payments,
        measurement: Measurement::FromInception,
    }
}

struct FailingSink;

impl LineItemSink for FailingSink {
    fn insert_many(&mut self, _bundle: &LineItemBundle) -> LeaseResult<()> {
        Err(LeaseError::Persistence("store offline".into()))
    }
}

#[test]
fn test_insert_persists_bundle() {
    let mut engine = engine(MemorySink::new());
    let run = engine.compute(&tenant(), &compute_input(), true).unwrap();

    assert!(run.persisted);
    assert_eq!(run.bundle.contract_id, "L-77");
    assert_eq!(run.bundle.operation, Operation::Compute);
    assert_eq!(run.output.result.state.lease_liability, dec!(118067));

    let stored = engine.sink().bundles();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].batch_id, run.bundle.batch_id);
}

#[test]
fn test_dry_run_leaves_sink_untouched() {
    let mut engine = engine(MemorySink::new());
    let run = engine.compute(&tenant(), &compute_input(), false).unwrap();
    assert!(!run.persisted);
    assert_eq!(run.bundle.amortization_lines.len(), 12);
    assert!(engine.into_sink().bundles().is_empty());
}

#[test]
fn test_unknown_tenant_is_config_unavailable() {
    let mut engine = engine(MemorySink::new());
    let err = engine
        .compute(&TenantKey::new("other", "lease"), &compute_input(), true)
        .unwrap_err();
    assert!(matches!(err, LeaseError::ConfigUnavailable { .. }));
    assert!(err.is_dependency_failure());
    assert!(engine.sink().bundles().is_empty());
}

#[test]
fn test_sink_failure_propagates() {
    let mut engine = engine(FailingSink);
    let err = engine.compute(&tenant(), &compute_input(), true).unwrap_err();
    assert!(matches!(err, LeaseError::Persistence(_)));
    // A preview never reaches the store.
    assert!(engine.compute(&tenant(), &compute_input(), false).is_ok());
}

#[test]
fn test_follow_up_operations_share_the_engine() {
    let mut engine = engine(MemorySink::new());
    let recognised = engine.compute(&tenant(), &compute_input(), true).unwrap();
    let schedules = recognised.output.result;

    let change = engine
        .change_compute(
            &tenant(),
            &ChangeComputeInput {
                contract_id: "L-77".into(),
                amortization: schedules.amortization.clone(),
                depreciation: schedules.depreciation.clone(),
                change_date: NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
            },
            true,
        )
        .unwrap();
    assert_eq!(change.bundle.operation, Operation::ChangeCompute);
    assert_eq!(
        change.bundle.summary.disclosures["future_payments"],
        dec!(90000)
    );

    let expire = engine
        .expire_compute(
            &tenant(),
            &ExpireComputeInput {
                contract: compute_input().contract,
                depreciation: schedules.depreciation,
                expiry_date: None,
            },
            true,
        )
        .unwrap();
    assert!(!expire.output.result.recomputed);

    let operations: Vec<Operation> = engine.sink().bundles().iter().map(|b| b.operation).collect();
    assert_eq!(
        operations,
        vec![Operation::Compute, Operation::ChangeCompute, Operation::ExpireCompute]
    );
}
