use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type Money = Decimal;
pub type Rate = Decimal;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Individual,
    #[serde(alias = "HUF")]
    Huf,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Old,
    New,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Old => f.write_str("old"),
            Regime::New => f.write_str("new"),
        }
    }
}

/// Indian fiscal year, identified by its starting calendar year and written
/// as `2024-25`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FiscalYear(u16);

impl FiscalYear {
    pub fn starting(year: u16) -> Self {
        Self(year)
    }

    pub fn start_year(self) -> u16 {
        self.0
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.0, (u32::from(self.0) + 1) % 100)
    }
}

impl FromStr for FiscalYear {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches("FY").trim();
        let (start, end) = match trimmed.split_once('-') {
            Some((start, end)) => (start, Some(end)),
            None => (trimmed, None),
        };
        let start: u16 = start
            .parse()
            .map_err(|_| format!("invalid fiscal year '{s}', expected e.g. 2024-25"))?;
        if let Some(end) = end {
            let next = u32::from(start) + 1;
            let parsed: u32 = end
                .parse()
                .map_err(|_| format!("invalid fiscal year '{s}', expected e.g. 2024-25"))?;
            let consecutive = match end.len() {
                2 => parsed == next % 100,
                4 => parsed == next,
                _ => false,
            };
            if !consecutive {
                return Err(format!(
                    "fiscal year '{s}' must span consecutive years, e.g. {start}-{:02}",
                    next % 100
                ));
            }
        }
        Ok(Self(start))
    }
}

impl TryFrom<String> for FiscalYear {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FiscalYear> for String {
    fn from(value: FiscalYear) -> Self {
        value.to_string()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Equity,
    Other,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldingTerm {
    Short,
    Long,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GainBucket {
    StcgEquity,
    LtcgEquity,
    StcgOther,
    LtcgOther,
}

impl GainBucket {
    pub const ALL: [GainBucket; 4] = [
        GainBucket::StcgEquity,
        GainBucket::LtcgEquity,
        GainBucket::StcgOther,
        GainBucket::LtcgOther,
    ];

    pub fn of(category: AssetCategory, term: HoldingTerm) -> Self {
        match (category, term) {
            (AssetCategory::Equity, HoldingTerm::Short) => GainBucket::StcgEquity,
            (AssetCategory::Equity, HoldingTerm::Long) => GainBucket::LtcgEquity,
            (AssetCategory::Other, HoldingTerm::Short) => GainBucket::StcgOther,
            (AssetCategory::Other, HoldingTerm::Long) => GainBucket::LtcgOther,
        }
    }
}

/// A realised gain (positive) or loss (negative). Either `term` or
/// `holding_months` must be present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GainEntry {
    pub category: AssetCategory,
    #[serde(default)]
    pub term: Option<HoldingTerm>,
    #[serde(default)]
    pub holding_months: Option<u32>,
    pub amount: Money,
}

impl GainEntry {
    pub fn new(category: AssetCategory, term: HoldingTerm, amount: Money) -> Self {
        Self {
            category,
            term: Some(term),
            holding_months: None,
            amount,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum DeductionSection {
    #[serde(rename = "80C", alias = "80c")]
    Sec80C,
    #[serde(rename = "80D-self", alias = "80d-self")]
    Sec80DSelf,
    #[serde(rename = "80D-parents", alias = "80d-parents")]
    Sec80DParents,
    #[serde(rename = "80CCD1B", alias = "80ccd1b")]
    Sec80Ccd1B,
    #[serde(rename = "80E", alias = "80e")]
    Sec80E,
    #[serde(rename = "80G-50", alias = "80g-50")]
    Sec80G50,
    #[serde(rename = "80G-100", alias = "80g-100")]
    Sec80G100,
    #[serde(rename = "24B", alias = "24b")]
    Sec24B,
    #[serde(rename = "professional-tax", alias = "professionalTax")]
    ProfessionalTax,
    #[serde(rename = "savings-interest", alias = "80TTA", alias = "80TTB")]
    SavingsInterest,
    #[serde(rename = "other")]
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxInputProfile {
    pub entity_type: EntityType,
    pub age: u32,
    #[serde(default)]
    pub parents_age: Option<u32>,
    pub ordinary_income: Money,
    #[serde(default)]
    pub capital_gains: Vec<GainEntry>,
    #[serde(default)]
    pub deduction_claims: BTreeMap<DeductionSection, Money>,
    #[serde(default)]
    pub regime_hint: Option<Regime>,
}

impl TaxInputProfile {
    pub fn new(entity_type: EntityType, age: u32, ordinary_income: Money) -> Self {
        Self {
            entity_type,
            age,
            parents_age: None,
            ordinary_income,
            capital_gains: Vec::new(),
            deduction_claims: BTreeMap::new(),
            regime_hint: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClampReason {
    NegativeAmount,
    SectionCap,
    IneligibleEntity,
    NotAllowedInRegime,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionLine {
    pub claimed: Money,
    pub allowed: Money,
    pub cap: Option<Money>,
    pub clamp: Option<ClampReason>,
}

/// Recorded whenever an input value was altered before use.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAdjustment {
    pub field: String,
    pub original: Money,
    pub applied: Money,
    pub reason: ClampReason,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketOutcome {
    pub bucket: GainBucket,
    pub net: Money,
    pub taxable: Money,
    pub exemption: Money,
    pub rate: Option<Rate>,
    pub tax: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapitalGainsSummary {
    pub buckets: Vec<BucketOutcome>,
    pub special_rate_income: Money,
    pub special_rate_tax: Money,
    pub ordinary_income_addition: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub fiscal_year: FiscalYear,
    pub regime: Regime,
    pub gross_ordinary_income: Money,
    pub standard_deduction: Money,
    pub total_deduction: Money,
    pub deductions: BTreeMap<DeductionSection, DeductionLine>,
    pub taxable_ordinary_income: Money,
    pub marginal_slab_rate: Rate,
    pub capital_gains: CapitalGainsSummary,
    pub total_income: Money,
    pub ordinary_tax: Money,
    pub special_rate_tax: Money,
    pub rebate: Money,
    pub surcharge_rate: Rate,
    pub surcharge: Money,
    pub surcharge_marginal_relief: Money,
    pub cess: Money,
    pub total_liability: Money,
    pub adjustments: Vec<InputAdjustment>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeComparison {
    pub selected: TaxBreakdown,
    pub alternative: Option<TaxBreakdown>,
    pub savings: Money,
}
