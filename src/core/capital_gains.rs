use rust_decimal::Decimal;

use super::error::{TaxError, TaxResult};
use super::rate_table::CapitalGainsRates;
use super::types::{
    AssetCategory, BucketOutcome, CapitalGainsSummary, GainBucket, GainEntry, HoldingTerm, Money,
};

/// Net bucket totals. Losses offset gains inside a bucket only; nothing is
/// carried across buckets or years.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GainNets {
    pub stcg_equity: Money,
    pub ltcg_equity: Money,
    pub stcg_other: Money,
    pub ltcg_other: Money,
}

impl GainNets {
    pub fn get(&self, bucket: GainBucket) -> Money {
        match bucket {
            GainBucket::StcgEquity => self.stcg_equity,
            GainBucket::LtcgEquity => self.ltcg_equity,
            GainBucket::StcgOther => self.stcg_other,
            GainBucket::LtcgOther => self.ltcg_other,
        }
    }

    fn add(&mut self, bucket: GainBucket, amount: Money) {
        match bucket {
            GainBucket::StcgEquity => self.stcg_equity += amount,
            GainBucket::LtcgEquity => self.ltcg_equity += amount,
            GainBucket::StcgOther => self.stcg_other += amount,
            GainBucket::LtcgOther => self.ltcg_other += amount,
        }
    }

    pub fn floored(&self) -> GainAmounts {
        GainAmounts {
            stcg_equity: self.stcg_equity.max(Decimal::ZERO),
            ltcg_equity: self.ltcg_equity.max(Decimal::ZERO),
            stcg_other: self.stcg_other.max(Decimal::ZERO),
            ltcg_other: self.ltcg_other.max(Decimal::ZERO),
        }
    }
}

/// Bucket totals floored at zero, as used for tax.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GainAmounts {
    pub stcg_equity: Money,
    pub ltcg_equity: Money,
    pub stcg_other: Money,
    pub ltcg_other: Money,
}

impl GainAmounts {
    /// Income taxed at special rates, before the LTCG-equity exemption.
    pub fn special_rate_income(&self) -> Money {
        self.stcg_equity + self.ltcg_equity + self.ltcg_other
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SpecialRateTaxes {
    pub stcg_equity: Money,
    pub ltcg_equity: Money,
    pub ltcg_other: Money,
}

impl SpecialRateTaxes {
    pub fn total(&self) -> Money {
        self.stcg_equity + self.ltcg_equity + self.ltcg_other
    }

    pub fn get(&self, bucket: GainBucket) -> Money {
        match bucket {
            GainBucket::StcgEquity => self.stcg_equity,
            GainBucket::LtcgEquity => self.ltcg_equity,
            GainBucket::LtcgOther => self.ltcg_other,
            GainBucket::StcgOther => Decimal::ZERO,
        }
    }
}

fn ltcg_equity_taxable(amount: Money, rates: &CapitalGainsRates) -> Money {
    (amount - rates.ltcg_equity_exemption).max(Decimal::ZERO)
}

pub fn special_rate_taxes(amounts: &GainAmounts, rates: &CapitalGainsRates) -> SpecialRateTaxes {
    SpecialRateTaxes {
        stcg_equity: amounts.stcg_equity * rates.stcg_equity_rate,
        ltcg_equity: ltcg_equity_taxable(amounts.ltcg_equity, rates) * rates.ltcg_equity_rate,
        ltcg_other: amounts.ltcg_other * rates.ltcg_other_rate,
    }
}

/// Resolves the bucket of an entry from its explicit term or its holding
/// period. Held strictly longer than the category threshold is long term.
pub fn resolve_bucket(entry: &GainEntry, rates: &CapitalGainsRates) -> TaxResult<GainBucket> {
    let threshold = match entry.category {
        AssetCategory::Equity => rates.equity_long_term_after_months,
        AssetCategory::Other => rates.other_long_term_after_months,
    };
    let derived = entry.holding_months.map(|months| {
        if months > threshold {
            HoldingTerm::Long
        } else {
            HoldingTerm::Short
        }
    });
    let term = match (entry.term, derived) {
        (Some(term), None) | (None, Some(term)) => term,
        (Some(term), Some(derived)) if term == derived => term,
        (Some(term), Some(derived)) => {
            return Err(TaxError::IncompatibleProfile(format!(
                "{:?} gain marked {term:?} term but held {} months ({derived:?} term)",
                entry.category,
                entry.holding_months.unwrap_or_default(),
            )));
        }
        (None, None) => {
            return Err(TaxError::IncompatibleProfile(format!(
                "{:?} gain of {} has neither a term nor a holding period",
                entry.category, entry.amount
            )));
        }
    };
    Ok(GainBucket::of(entry.category, term))
}

pub fn classify(entries: &[GainEntry], rates: &CapitalGainsRates) -> TaxResult<GainNets> {
    let mut nets = GainNets::default();
    for entry in entries {
        let bucket = resolve_bucket(entry, rates)?;
        nets.add(bucket, entry.amount);
    }
    Ok(nets)
}

/// Per-bucket taxable amounts and special-rate tax. STCG on other assets is
/// reported here but taxed through the slabs.
pub fn summarize(nets: &GainNets, rates: &CapitalGainsRates) -> CapitalGainsSummary {
    let amounts = nets.floored();
    let taxes = special_rate_taxes(&amounts, rates);

    let buckets = GainBucket::ALL
        .iter()
        .map(|&bucket| {
            let net = nets.get(bucket);
            let floored = net.max(Decimal::ZERO);
            let (taxable, exemption, rate) = match bucket {
                GainBucket::StcgEquity => (floored, Decimal::ZERO, Some(rates.stcg_equity_rate)),
                GainBucket::LtcgEquity => {
                    let taxable = ltcg_equity_taxable(floored, rates);
                    (taxable, floored - taxable, Some(rates.ltcg_equity_rate))
                }
                GainBucket::StcgOther => (floored, Decimal::ZERO, None),
                GainBucket::LtcgOther => (floored, Decimal::ZERO, Some(rates.ltcg_other_rate)),
            };
            BucketOutcome {
                bucket,
                net,
                taxable,
                exemption,
                rate,
                tax: taxes.get(bucket),
            }
        })
        .collect();

    CapitalGainsSummary {
        buckets,
        special_rate_income: amounts.special_rate_income(),
        special_rate_tax: taxes.total(),
        ordinary_income_addition: amounts.stcg_other,
    }
}
