use rust_decimal::Decimal;

use super::rate_table::Slab;
use super::types::Money;

/// Progressive tax on `income`. Each slab taxes the part of the income in
/// `(lower, min(upper, income)]`, so income equal to an upper bound stays
/// entirely within that slab.
pub fn slab_tax(slabs: &[Slab], income: Money) -> Money {
    let income = income.max(Decimal::ZERO);
    let mut tax = Decimal::ZERO;
    for slab in slabs {
        if income <= slab.lower {
            break;
        }
        let top = match slab.upper {
            Some(upper) => upper.min(income),
            None => income,
        };
        tax += (top - slab.lower) * slab.rate;
    }
    tax
}

/// Taxable ordinary income: gross plus short-term gains on other assets,
/// less the standard deduction and allowed itemised deductions.
pub fn taxable_ordinary_income(
    ordinary_income: Money,
    ordinary_income_addition: Money,
    standard_deduction: Money,
    total_deduction: Money,
) -> Money {
    (ordinary_income + ordinary_income_addition - standard_deduction - total_deduction)
        .max(Decimal::ZERO)
}

/// Marginal rate of the slab that holds `income`.
pub fn marginal_rate(slabs: &[Slab], income: Money) -> Decimal {
    slabs
        .iter()
        .rev()
        .find(|slab| income > slab.lower)
        .or_else(|| slabs.first())
        .map_or(Decimal::ZERO, |slab| slab.rate)
}
