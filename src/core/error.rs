use thiserror::Error;

use super::types::{FiscalYear, Regime};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxError {
    /// No rate table is registered for the requested year and regime.
    #[error("no rate table registered for fiscal year {year} ({regime} regime)")]
    UnsupportedFiscalYear { year: FiscalYear, regime: Regime },

    /// The profile cannot be classified, e.g. a gain entry without a term.
    #[error("incompatible profile: {0}")]
    IncompatibleProfile(String),

    /// A rate table failed validation at load time.
    #[error("invalid rate table {table}: {reason}")]
    InvalidRateTable { table: String, reason: String },

    /// A rate table source could not be read or parsed.
    #[error("rate table source error: {0}")]
    TableSource(String),
}

pub type TaxResult<T> = Result<T, TaxError>;
