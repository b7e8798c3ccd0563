mod commands;
mod input;
mod output;
mod sink;
mod tenant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use commands::lifecycle::OperationArgs;
use commands::schedule::ScheduleArgs;
use lease_engine_core::engine::TenantKey;

/// Lease liability and right-of-use asset computations
#[derive(Parser)]
#[command(
    name = "lse",
    version,
    about = "Lease liability and right-of-use asset computations",
    long_about = "A CLI for lease accounting with decimal precision. Recognises leases, \
                  re-measures them on modification, derecognises them on cancellation \
                  and expiry, and produces amortization and depreciation schedules."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(flatten)]
    tenant: TenantArgs,
}

/// Which tenant configuration applies
#[derive(Args)]
pub struct TenantArgs {
    /// Tenant configuration file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Tenant identifier
    #[arg(long, default_value = "default", global = true)]
    pub tenant_id: String,

    /// Application identifier
    #[arg(long, default_value = "lease", global = true)]
    pub app_id: String,
}

impl TenantArgs {
    pub fn key(&self) -> TenantKey {
        TenantKey::new(self.tenant_id.as_str(), self.app_id.as_str())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initial recognition: liability, ROU asset and both schedules
    Compute(OperationArgs),
    /// Disclosure totals at a change date, no re-measurement
    Change(OperationArgs),
    /// Re-measure a modified lease, optionally reducing its scope
    Debt(OperationArgs),
    /// Derecognise a lease cancelled before its term ends
    Cancel(OperationArgs),
    /// Stop depreciation of a transferred asset at lease expiry
    Expire(OperationArgs),
    /// Classify a lease as normal, short or minor
    Classify(ScheduleArgs),
    /// Generate a payment schedule from contract terms
    Generate(ScheduleArgs),
    /// Merge payments falling in the same month
    Normalize(ScheduleArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let tenant = &cli.tenant;
    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Compute(args) => commands::lifecycle::run_compute(args, tenant),
        Commands::Change(args) => commands::lifecycle::run_change(args, tenant),
        Commands::Debt(args) => commands::lifecycle::run_debt(args, tenant),
        Commands::Cancel(args) => commands::lifecycle::run_cancel(args, tenant),
        Commands::Expire(args) => commands::lifecycle::run_expire(args, tenant),
        Commands::Classify(args) => commands::schedule::run_classify(args, tenant),
        Commands::Generate(args) => commands::schedule::run_generate(args),
        Commands::Normalize(args) => commands::schedule::run_normalize(args),
        Commands::Version => {
            println!("lse {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
