mod capital_gains;
mod deductions;
mod engine;
mod error;
mod levies;
mod rate_table;
mod slab;
mod types;

pub use capital_gains::{GainAmounts, GainNets, classify, resolve_bucket, summarize};
pub use deductions::{DeductionOutcome, aggregate_deductions};
pub use engine::{assess_regime, compare_regimes, compute_tax, evaluate};
pub use error::{TaxError, TaxResult};
pub use levies::round_half_up;
pub use rate_table::{
    AgeBasis, AgeSlabs, CapitalGainsRates, Cap, DeductionRule, RateTable, RateTableRegistry,
    RebateRule, Slab, SurchargeSchedule, SurchargeTier,
};
pub use slab::slab_tax;
pub use types::{
    AssetCategory, BucketOutcome, CapitalGainsSummary, ClampReason, DeductionLine,
    DeductionSection, EntityType, FiscalYear, GainBucket, GainEntry, HoldingTerm,
    InputAdjustment, Money, Rate, RegimeComparison, Regime, TaxBreakdown, TaxInputProfile,
};
