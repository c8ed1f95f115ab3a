use rust_decimal::Decimal;
use tracing::debug;

use super::capital_gains::{classify, summarize};
use super::deductions::aggregate_deductions;
use super::error::TaxResult;
use super::levies::{TaxBase, assess, round_half_up};
use super::rate_table::{RateTable, RateTableRegistry};
use super::slab::{marginal_rate, taxable_ordinary_income};
use super::types::{
    ClampReason, FiscalYear, InputAdjustment, Regime, RegimeComparison, TaxBreakdown,
    TaxInputProfile,
};

/// Runs the whole pipeline for one regime's table.
pub fn assess_regime(table: &RateTable, profile: &TaxInputProfile) -> TaxResult<TaxBreakdown> {
    let mut adjustments = Vec::new();
    let ordinary_income = if profile.ordinary_income < Decimal::ZERO {
        adjustments.push(InputAdjustment {
            field: "ordinaryIncome".to_string(),
            original: profile.ordinary_income,
            applied: Decimal::ZERO,
            reason: ClampReason::NegativeAmount,
        });
        Decimal::ZERO
    } else {
        profile.ordinary_income
    };

    let nets = classify(&profile.capital_gains, &table.capital_gains)?;
    let capital_gains = summarize(&nets, &table.capital_gains);
    let deductions = aggregate_deductions(table, profile);

    let taxable_ordinary = taxable_ordinary_income(
        ordinary_income,
        capital_gains.ordinary_income_addition,
        table.standard_deduction,
        deductions.total,
    );
    let slabs = table.slabs_for(profile.age, profile.entity_type);
    let base = TaxBase {
        slabs,
        ordinary_income: taxable_ordinary,
        gains: nets.floored(),
    };
    let levies = assess(table, profile.entity_type, &base);
    let total_liability = round_half_up(levies.total).max(Decimal::ZERO);

    debug!(
        fiscal_year = %table.fiscal_year,
        regime = %table.regime,
        taxable_ordinary = %taxable_ordinary,
        total_liability = %total_liability,
        "assessed regime"
    );

    Ok(TaxBreakdown {
        fiscal_year: table.fiscal_year,
        regime: table.regime,
        gross_ordinary_income: ordinary_income,
        standard_deduction: table.standard_deduction,
        total_deduction: deductions.total,
        deductions: deductions.lines,
        taxable_ordinary_income: taxable_ordinary,
        marginal_slab_rate: marginal_rate(slabs, taxable_ordinary),
        total_income: base.total_income(),
        capital_gains,
        ordinary_tax: levies.ordinary_tax,
        special_rate_tax: levies.special_rate_tax,
        rebate: levies.rebate,
        surcharge_rate: levies.surcharge_rate,
        surcharge: levies.surcharge,
        surcharge_marginal_relief: levies.surcharge_marginal_relief,
        cess: levies.cess,
        total_liability,
        adjustments,
    })
}

/// Evaluates both regimes and selects the lower liability. Equal
/// liabilities select the new regime.
pub fn compare_regimes(
    registry: &RateTableRegistry,
    profile: &TaxInputProfile,
    fiscal_year: FiscalYear,
) -> TaxResult<RegimeComparison> {
    let old = assess_regime(registry.for_year(fiscal_year, Regime::Old)?, profile)?;
    let new = assess_regime(registry.for_year(fiscal_year, Regime::New)?, profile)?;

    let (selected, alternative) = if new.total_liability <= old.total_liability {
        (new, old)
    } else {
        (old, new)
    };
    let savings = alternative.total_liability - selected.total_liability;
    debug!(
        fiscal_year = %fiscal_year,
        selected = %selected.regime,
        savings = %savings,
        "compared regimes"
    );

    Ok(RegimeComparison {
        selected,
        alternative: Some(alternative),
        savings,
    })
}

/// Honours an explicit regime (argument first, then the profile's hint);
/// compares both regimes otherwise.
pub fn evaluate(
    registry: &RateTableRegistry,
    profile: &TaxInputProfile,
    fiscal_year: FiscalYear,
    regime_hint: Option<Regime>,
) -> TaxResult<RegimeComparison> {
    match regime_hint.or(profile.regime_hint) {
        Some(regime) => {
            let selected = assess_regime(registry.for_year(fiscal_year, regime)?, profile)?;
            Ok(RegimeComparison {
                selected,
                alternative: None,
                savings: Decimal::ZERO,
            })
        }
        None => compare_regimes(registry, profile, fiscal_year),
    }
}

pub fn compute_tax(
    registry: &RateTableRegistry,
    profile: &TaxInputProfile,
    fiscal_year: FiscalYear,
    regime_hint: Option<Regime>,
) -> TaxResult<TaxBreakdown> {
    evaluate(registry, profile, fiscal_year, regime_hint).map(|result| result.selected)
}
