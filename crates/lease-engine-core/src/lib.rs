pub mod amortization;
pub mod bundle;
pub mod classification;
pub mod config;
pub mod depreciation;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod payments;
pub mod time_value;
pub mod types;
pub mod validation;

pub use error::LeaseError;
pub use types::*;

/// Standard result type for all lease-engine operations
pub type LeaseResult<T> = Result<T, LeaseError>;
