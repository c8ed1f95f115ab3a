//! Rebate, surcharge and cess layered over slab and special-rate tax.

use rust_decimal::{Decimal, RoundingStrategy};

use super::capital_gains::{GainAmounts, SpecialRateTaxes, special_rate_taxes};
use super::rate_table::{RateTable, RebateRule, Slab};
use super::slab::slab_tax;
use super::types::{EntityType, GainBucket, Money, Rate};

/// Everything the levy layer needs to price an income, so the same
/// computation can be repeated at a surcharge threshold.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TaxBase<'a> {
    pub slabs: &'a [Slab],
    pub ordinary_income: Money,
    pub gains: GainAmounts,
}

impl TaxBase<'_> {
    pub fn total_income(&self) -> Money {
        self.ordinary_income + self.gains.special_rate_income()
    }

    /// Same composition with income lowered to `target`: ordinary income
    /// gives way first, then LTCG-other, STCG-equity and LTCG-equity.
    fn reduced_to(&self, target: Money) -> Self {
        let mut excess = (self.total_income() - target).max(Decimal::ZERO);
        let mut take = |amount: &mut Money| {
            let taken = excess.min(*amount);
            *amount -= taken;
            excess -= taken;
        };
        let mut reduced = *self;
        take(&mut reduced.ordinary_income);
        take(&mut reduced.gains.ltcg_other);
        take(&mut reduced.gains.stcg_equity);
        take(&mut reduced.gains.ltcg_equity);
        reduced
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Levies {
    pub ordinary_tax: Money,
    pub special_rate_tax: Money,
    pub rebate: Money,
    pub surcharge_rate: Rate,
    pub surcharge: Money,
    pub surcharge_marginal_relief: Money,
    pub cess: Money,
    /// Unrounded liability.
    pub total: Money,
}

#[derive(Copy, Clone, Debug, Default)]
struct RebatedTax {
    ordinary_before: Money,
    special_before: Money,
    rebate: Money,
    ordinary: Money,
    special: Money,
}

impl RebatedTax {
    fn total(&self) -> Money {
        self.ordinary + self.special
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct SurchargeOutcome {
    rate: Rate,
    gross: Money,
    relief: Money,
}

impl SurchargeOutcome {
    fn net(&self) -> Money {
        self.gross - self.relief
    }
}

/// Tax the rebate may absorb: ordinary tax plus the special-rate buckets
/// the rule covers, or nothing for an ineligible entity.
fn rebatable_tax(
    rule: &RebateRule,
    entity: EntityType,
    ordinary_tax: Money,
    special: &SpecialRateTaxes,
) -> Money {
    if !rule.entities.contains(&entity) {
        return Decimal::ZERO;
    }
    let covered: Money = GainBucket::ALL
        .iter()
        .filter(|bucket| rule.covers.contains(bucket))
        .map(|&bucket| special.get(bucket))
        .sum();
    ordinary_tax + covered
}

/// Up to the threshold the rebate is `min(rebatable, cap)`. Above it, with
/// marginal relief, tax payable may exceed the payable at the threshold by
/// no more than the income above the threshold.
fn rebate_for(
    table: &RateTable,
    entity: EntityType,
    base: &TaxBase<'_>,
    ordinary_tax: Money,
    special: &SpecialRateTaxes,
) -> Money {
    let rule = &table.rebate;
    let rebatable = rebatable_tax(rule, entity, ordinary_tax, special);
    if rebatable <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let total_income = base.total_income();
    if total_income <= rule.threshold {
        return rebatable.min(rule.cap);
    }
    if !rule.marginal_relief {
        return Decimal::ZERO;
    }

    let at_threshold = rebated_tax(table, entity, &base.reduced_to(rule.threshold));
    let ceiling = at_threshold.total() + (total_income - rule.threshold);
    (ordinary_tax + special.total() - ceiling)
        .max(Decimal::ZERO)
        .min(rebatable)
        .min(rule.cap)
}

fn rebated_tax(table: &RateTable, entity: EntityType, base: &TaxBase<'_>) -> RebatedTax {
    let ordinary_before = slab_tax(base.slabs, base.ordinary_income);
    let special = special_rate_taxes(&base.gains, &table.capital_gains);
    let special_before = special.total();
    let rebate = rebate_for(table, entity, base, ordinary_before, &special);
    let from_ordinary = rebate.min(ordinary_before);
    RebatedTax {
        ordinary_before,
        special_before,
        rebate,
        ordinary: ordinary_before - from_ordinary,
        special: special_before - (rebate - from_ordinary),
    }
}

/// Surcharge for the tier the income falls in. Marginal relief caps the
/// increase of tax plus surcharge over the threshold at the income above it.
fn surcharge_for(
    table: &RateTable,
    entity: EntityType,
    base: &TaxBase<'_>,
    tax: &RebatedTax,
) -> SurchargeOutcome {
    let total_income = base.total_income();
    let Some(tier) = table.surcharge.tier_for(total_income) else {
        return SurchargeOutcome::default();
    };
    let gross =
        tier.rate * tax.ordinary + table.surcharge.special_rate(tier.rate) * tax.special;

    let at_threshold = base.reduced_to(tier.threshold);
    let threshold_tax = rebated_tax(table, entity, &at_threshold);
    let threshold_surcharge = surcharge_for(table, entity, &at_threshold, &threshold_tax);
    let ceiling =
        threshold_tax.total() + threshold_surcharge.net() + (total_income - tier.threshold);
    let relief = (tax.total() + gross - ceiling)
        .max(Decimal::ZERO)
        .min(gross);

    SurchargeOutcome {
        rate: tier.rate,
        gross,
        relief,
    }
}

pub fn assess(table: &RateTable, entity: EntityType, base: &TaxBase<'_>) -> Levies {
    let tax = rebated_tax(table, entity, base);
    let surcharge = surcharge_for(table, entity, base, &tax);
    let cess = table.cess_rate * (tax.total() + surcharge.net());
    Levies {
        ordinary_tax: tax.ordinary_before,
        special_rate_tax: tax.special_before,
        rebate: tax.rebate,
        surcharge_rate: surcharge.rate,
        surcharge: surcharge.net(),
        surcharge_marginal_relief: surcharge.relief,
        cess,
        total: tax.total() + surcharge.net() + cess,
    }
}

/// Nearest whole currency unit, halves rounded up.
pub fn round_half_up(amount: Money) -> Money {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
