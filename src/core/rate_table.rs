//! Versioned rate tables, one per fiscal year and regime.
//!
//! Tables are plain JSON documents so they can be audited against the
//! Finance Act of the year. The built-in set is embedded at compile time;
//! a directory of replacement tables can be loaded at start-up instead.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{TaxError, TaxResult};
use super::types::{DeductionSection, EntityType, FiscalYear, GainBucket, Money, Rate, Regime};

const BUILTIN_TABLES: [(&str, &str); 6] = [
    (
        "fy2023-24-old.json",
        include_str!("../../tables/fy2023-24-old.json"),
    ),
    (
        "fy2023-24-new.json",
        include_str!("../../tables/fy2023-24-new.json"),
    ),
    (
        "fy2024-25-old.json",
        include_str!("../../tables/fy2024-25-old.json"),
    ),
    (
        "fy2024-25-new.json",
        include_str!("../../tables/fy2024-25-new.json"),
    ),
    (
        "fy2025-26-old.json",
        include_str!("../../tables/fy2025-26-old.json"),
    ),
    (
        "fy2025-26-new.json",
        include_str!("../../tables/fy2025-26-new.json"),
    ),
];

/// One marginal-rate band. `upper: None` marks the unbounded top slab.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Slab {
    pub lower: Money,
    pub upper: Option<Money>,
    pub rate: Rate,
}

/// Replacement slabs for individuals at or above `min_age`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgeSlabs {
    pub min_age: u32,
    pub slabs: Vec<Slab>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RebateRule {
    pub threshold: Money,
    pub cap: Money,
    pub entities: Vec<EntityType>,
    /// Special-rate buckets whose tax the rebate may absorb.
    #[serde(default)]
    pub covers: Vec<GainBucket>,
    /// Above the threshold, tax payable is limited to the excess income.
    #[serde(default)]
    pub marginal_relief: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurchargeTier {
    pub threshold: Money,
    pub rate: Rate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurchargeSchedule {
    pub tiers: Vec<SurchargeTier>,
    #[serde(default)]
    pub special_rate_cap: Option<Rate>,
}

impl SurchargeSchedule {
    /// Highest tier whose threshold the income strictly exceeds.
    pub fn tier_for(&self, total_income: Money) -> Option<&SurchargeTier> {
        self.tiers
            .iter()
            .rev()
            .find(|tier| total_income > tier.threshold)
    }

    pub fn special_rate(&self, rate: Rate) -> Rate {
        match self.special_rate_cap {
            Some(cap) => rate.min(cap),
            None => rate,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapitalGainsRates {
    pub stcg_equity_rate: Rate,
    pub ltcg_equity_rate: Rate,
    pub ltcg_equity_exemption: Money,
    pub ltcg_other_rate: Rate,
    pub equity_long_term_after_months: u32,
    pub other_long_term_after_months: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgeBasis {
    Taxpayer,
    Parents,
}

fn default_age_basis() -> AgeBasis {
    AgeBasis::Taxpayer
}

fn default_share() -> Rate {
    Decimal::ONE
}

fn default_senior_age() -> u32 {
    60
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeductionRule {
    pub section: DeductionSection,
    /// `None` means the section is not capped.
    pub cap: Option<Money>,
    #[serde(default)]
    pub senior_cap: Option<Money>,
    #[serde(default = "default_age_basis")]
    pub age_basis: AgeBasis,
    /// Fraction of the capped claim that is deductible.
    #[serde(default = "default_share")]
    pub eligible_share: Rate,
    pub entities: Vec<EntityType>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cap {
    Limit(Money),
    Unbounded,
}

impl Cap {
    pub fn clamp(self, amount: Money) -> Money {
        let floored = amount.max(Decimal::ZERO);
        match self {
            Cap::Limit(limit) => floored.min(limit),
            Cap::Unbounded => floored,
        }
    }

    pub fn limit(self) -> Option<Money> {
        match self {
            Cap::Limit(limit) => Some(limit),
            Cap::Unbounded => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateTable {
    pub fiscal_year: FiscalYear,
    pub regime: Regime,
    pub standard_deduction: Money,
    /// Whether chapter VI-A style claims are honoured at all.
    pub itemized_deductions: bool,
    #[serde(default = "default_senior_age")]
    pub senior_age: u32,
    pub slabs: Vec<Slab>,
    #[serde(default)]
    pub age_slabs: Vec<AgeSlabs>,
    pub rebate: RebateRule,
    pub surcharge: SurchargeSchedule,
    pub cess_rate: Rate,
    pub capital_gains: CapitalGainsRates,
    #[serde(default)]
    pub deductions: Vec<DeductionRule>,
}

impl RateTable {
    pub fn from_json(label: &str, json: &str) -> TaxResult<Self> {
        let table: RateTable = serde_json::from_str(json)
            .map_err(|e| TaxError::TableSource(format!("{label}: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    pub fn label(&self) -> String {
        format!("FY {} ({} regime)", self.fiscal_year, self.regime)
    }

    /// Slabs for the taxpayer. Age bands only apply to individuals.
    pub fn slabs_for(&self, age: u32, entity: EntityType) -> &[Slab] {
        if entity == EntityType::Individual {
            if let Some(band) = self
                .age_slabs
                .iter()
                .filter(|band| age >= band.min_age)
                .max_by_key(|band| band.min_age)
            {
                return &band.slabs;
            }
        }
        &self.slabs
    }

    pub fn deduction_rule(&self, section: DeductionSection) -> Option<&DeductionRule> {
        if !self.itemized_deductions {
            return None;
        }
        self.deductions.iter().find(|rule| rule.section == section)
    }

    /// Ceiling for a section. `age` is the age named by the rule's basis
    /// (the parents' age for 80D-parents). Ineligible or unknown sections
    /// are capped at zero.
    pub fn cap_for(&self, section: DeductionSection, age: u32, entity: EntityType) -> Cap {
        let Some(rule) = self.deduction_rule(section) else {
            return Cap::Limit(Decimal::ZERO);
        };
        if !rule.entities.contains(&entity) {
            return Cap::Limit(Decimal::ZERO);
        }
        let senior = entity == EntityType::Individual && age >= self.senior_age;
        let cap = match (senior, rule.senior_cap) {
            (true, Some(senior_cap)) => Some(senior_cap),
            _ => rule.cap,
        };
        cap.map_or(Cap::Unbounded, Cap::Limit)
    }

    pub fn validate(&self) -> TaxResult<()> {
        let invalid = |reason: String| TaxError::InvalidRateTable {
            table: self.label(),
            reason,
        };

        validate_slabs(&self.slabs).map_err(|e| invalid(format!("slabs: {e}")))?;
        let mut previous_age = None;
        for band in &self.age_slabs {
            if previous_age.is_some_and(|age| band.min_age <= age) {
                return Err(invalid("age_slabs must be in ascending min_age order".into()));
            }
            previous_age = Some(band.min_age);
            validate_slabs(&band.slabs)
                .map_err(|e| invalid(format!("age_slabs[{}]: {e}", band.min_age)))?;
        }

        if self.standard_deduction < Decimal::ZERO {
            return Err(invalid("standard_deduction must be >= 0".into()));
        }
        if self.rebate.threshold < Decimal::ZERO || self.rebate.cap < Decimal::ZERO {
            return Err(invalid("rebate threshold and cap must be >= 0".into()));
        }

        let mut previous_threshold: Option<Money> = None;
        for tier in &self.surcharge.tiers {
            if previous_threshold.is_some_and(|t| tier.threshold <= t) {
                return Err(invalid("surcharge tiers must have ascending thresholds".into()));
            }
            previous_threshold = Some(tier.threshold);
            check_rate("surcharge tier rate", tier.rate).map_err(invalid)?;
        }
        if let Some(cap) = self.surcharge.special_rate_cap {
            check_rate("surcharge special_rate_cap", cap).map_err(invalid)?;
        }

        let cg = &self.capital_gains;
        for (name, rate) in [
            ("cess_rate", self.cess_rate),
            ("stcg_equity_rate", cg.stcg_equity_rate),
            ("ltcg_equity_rate", cg.ltcg_equity_rate),
            ("ltcg_other_rate", cg.ltcg_other_rate),
        ] {
            check_rate(name, rate).map_err(invalid)?;
        }
        if cg.ltcg_equity_exemption < Decimal::ZERO {
            return Err(invalid("ltcg_equity_exemption must be >= 0".into()));
        }

        let mut seen = BTreeSet::new();
        for rule in &self.deductions {
            if !seen.insert(rule.section) {
                return Err(invalid(format!("duplicate deduction rule {:?}", rule.section)));
            }
            if rule.cap.is_some_and(|cap| cap < Decimal::ZERO)
                || rule.senior_cap.is_some_and(|cap| cap < Decimal::ZERO)
            {
                return Err(invalid(format!("{:?}: caps must be >= 0", rule.section)));
            }
            check_rate("eligible_share", rule.eligible_share).map_err(invalid)?;
        }
        Ok(())
    }
}

fn check_rate(name: &str, rate: Rate) -> Result<(), String> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(format!("{name} must be between 0 and 1, got {rate}"));
    }
    Ok(())
}

fn validate_slabs(slabs: &[Slab]) -> Result<(), String> {
    let Some(first) = slabs.first() else {
        return Err("at least one slab is required".into());
    };
    if !first.lower.is_zero() {
        return Err(format!("first slab must start at 0, got {}", first.lower));
    }
    let last = slabs.len() - 1;
    for (idx, slab) in slabs.iter().enumerate() {
        check_rate("slab rate", slab.rate)?;
        match slab.upper {
            Some(upper) if idx == last => {
                return Err(format!("last slab must be unbounded, got upper {upper}"));
            }
            Some(upper) => {
                if upper <= slab.lower {
                    return Err(format!("slab {idx} upper {upper} must exceed lower {}", slab.lower));
                }
                if slabs[idx + 1].lower != upper {
                    return Err(format!(
                        "slab {} must start at {upper}, got {}",
                        idx + 1,
                        slabs[idx + 1].lower
                    ));
                }
            }
            None if idx != last => {
                return Err(format!("only the last slab may be unbounded (slab {idx})"));
            }
            None => {}
        }
    }
    Ok(())
}

/// Read-only set of rate tables keyed by fiscal year and regime. Built once
/// at start-up and shared between calculations.
#[derive(Clone, Debug, Default)]
pub struct RateTableRegistry {
    tables: BTreeMap<(FiscalYear, Regime), RateTable>,
}

impl RateTableRegistry {
    pub fn builtin() -> TaxResult<Self> {
        let tables = BUILTIN_TABLES
            .iter()
            .map(|(label, json)| RateTable::from_json(label, json))
            .collect::<TaxResult<Vec<_>>>()?;
        Self::from_tables(tables)
    }

    pub fn from_tables(tables: impl IntoIterator<Item = RateTable>) -> TaxResult<Self> {
        let mut registry = Self::default();
        for table in tables {
            table.validate()?;
            let key = (table.fiscal_year, table.regime);
            if registry.tables.contains_key(&key) {
                return Err(TaxError::InvalidRateTable {
                    table: table.label(),
                    reason: "registered more than once".into(),
                });
            }
            registry.tables.insert(key, table);
        }
        Ok(registry)
    }

    /// Loads every `*.json` file in `dir`.
    pub fn load_dir(dir: &Path) -> TaxResult<Self> {
        let entries = fs::read_dir(dir)
            .map_err(|e| TaxError::TableSource(format!("{}: {e}", dir.display())))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| TaxError::TableSource(format!("{}: {e}", dir.display())))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tables = Vec::with_capacity(paths.len());
        for path in &paths {
            let json = fs::read_to_string(path)
                .map_err(|e| TaxError::TableSource(format!("{}: {e}", path.display())))?;
            tables.push(RateTable::from_json(&path.display().to_string(), &json)?);
        }
        if tables.is_empty() {
            return Err(TaxError::TableSource(format!(
                "{}: no *.json rate tables found",
                dir.display()
            )));
        }
        Self::from_tables(tables)
    }

    pub fn for_year(&self, year: FiscalYear, regime: Regime) -> TaxResult<&RateTable> {
        self.tables
            .get(&(year, regime))
            .ok_or(TaxError::UnsupportedFiscalYear { year, regime })
    }

    pub fn entries(&self) -> impl Iterator<Item = (FiscalYear, Regime)> + '_ {
        self.tables.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fy(year: u16) -> FiscalYear {
        FiscalYear::starting(year)
    }

    fn builtin() -> RateTableRegistry {
        RateTableRegistry::builtin().expect("built-in tables are valid")
    }

    #[test]
    fn builtin_registry_has_both_regimes_for_each_year() {
        let registry = builtin();
        assert_eq!(registry.len(), 6);
        for year in [2023, 2024, 2025] {
            for regime in [Regime::Old, Regime::New] {
                let table = registry.for_year(fy(year), regime).expect("registered");
                assert_eq!(table.fiscal_year, fy(year));
                assert_eq!(table.regime, regime);
            }
        }
    }

    #[test]
    fn unknown_year_is_unsupported() {
        let err = builtin()
            .for_year(fy(2019), Regime::New)
            .expect_err("2019-20 is not registered");
        assert_eq!(
            err,
            TaxError::UnsupportedFiscalYear {
                year: fy(2019),
                regime: Regime::New
            }
        );
    }

    #[test]
    fn senior_slabs_apply_to_individuals_only() {
        let registry = builtin();
        let table = registry.for_year(fy(2023), Regime::Old).expect("registered");
        assert_eq!(table.slabs_for(45, EntityType::Individual)[0].upper, Some(dec!(250000)));
        assert_eq!(table.slabs_for(60, EntityType::Individual)[0].upper, Some(dec!(300000)));
        assert_eq!(table.slabs_for(85, EntityType::Individual)[0].upper, Some(dec!(500000)));
        assert_eq!(table.slabs_for(85, EntityType::Huf)[0].upper, Some(dec!(250000)));
    }

    #[test]
    fn caps_depend_on_age_and_entity() {
        let registry = builtin();
        let table = registry.for_year(fy(2023), Regime::Old).expect("registered");
        assert_eq!(
            table.cap_for(DeductionSection::Sec80C, 30, EntityType::Individual),
            Cap::Limit(dec!(150000))
        );
        assert_eq!(
            table.cap_for(DeductionSection::Sec80DSelf, 59, EntityType::Individual),
            Cap::Limit(dec!(25000))
        );
        assert_eq!(
            table.cap_for(DeductionSection::Sec80DSelf, 60, EntityType::Individual),
            Cap::Limit(dec!(50000))
        );
        assert_eq!(
            table.cap_for(DeductionSection::Sec80E, 30, EntityType::Individual),
            Cap::Unbounded
        );
        assert_eq!(
            table.cap_for(DeductionSection::Sec80Ccd1B, 30, EntityType::Huf),
            Cap::Limit(Decimal::ZERO)
        );
    }

    #[test]
    fn new_regime_caps_every_section_at_zero() {
        let registry = builtin();
        let table = registry.for_year(fy(2024), Regime::New).expect("registered");
        assert_eq!(
            table.cap_for(DeductionSection::Sec80C, 30, EntityType::Individual),
            Cap::Limit(Decimal::ZERO)
        );
        assert_eq!(table.deduction_rule(DeductionSection::Sec80E), None);
    }

    #[test]
    fn surcharge_tier_requires_income_strictly_above_threshold() {
        let registry = builtin();
        let table = registry.for_year(fy(2023), Regime::Old).expect("registered");
        assert_eq!(table.surcharge.tier_for(dec!(5000000)), None);
        assert_eq!(
            table.surcharge.tier_for(dec!(5000001)).map(|t| t.rate),
            Some(dec!(0.10))
        );
        assert_eq!(
            table.surcharge.tier_for(dec!(60000000)).map(|t| t.rate),
            Some(dec!(0.37))
        );
        let new = registry.for_year(fy(2023), Regime::New).expect("registered");
        assert_eq!(
            new.surcharge.tier_for(dec!(60000000)).map(|t| t.rate),
            Some(dec!(0.25))
        );
    }

    #[test]
    fn validation_rejects_gap_between_slabs() {
        let registry = builtin();
        let mut table = registry
            .for_year(fy(2024), Regime::New)
            .expect("registered")
            .clone();
        table.slabs[1].lower = dec!(300001);
        let err = table.validate().expect_err("gap must be rejected");
        assert!(matches!(err, TaxError::InvalidRateTable { .. }));
        assert!(err.to_string().contains("slab 1 must start at 300000"));
    }

    #[test]
    fn validation_rejects_bounded_last_slab_and_bad_rates() {
        let registry = builtin();
        let base = registry
            .for_year(fy(2024), Regime::Old)
            .expect("registered")
            .clone();

        let mut bounded = base.clone();
        if let Some(last) = bounded.slabs.last_mut() {
            last.upper = Some(dec!(99999999));
        }
        assert!(bounded.validate().is_err());

        let mut bad_rate = base.clone();
        bad_rate.cess_rate = dec!(1.5);
        assert!(bad_rate.validate().is_err());

        let mut duplicated = base;
        let rule = duplicated.deductions[0].clone();
        duplicated.deductions.push(rule);
        assert!(duplicated.validate().is_err());
    }

    #[test]
    fn registry_rejects_duplicate_tables() {
        let registry = builtin();
        let table = registry
            .for_year(fy(2025), Regime::New)
            .expect("registered")
            .clone();
        let err = RateTableRegistry::from_tables([table.clone(), table]).expect_err("duplicate");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn malformed_json_is_a_source_error() {
        let err = RateTable::from_json("broken.json", "{ \"fiscal_year\": 12 }")
            .expect_err("must fail");
        assert!(matches!(err, TaxError::TableSource(msg) if msg.starts_with("broken.json")));
    }

    #[test]
    fn load_dir_reads_json_tables() {
        let dir = std::env::temp_dir().join(format!("taxwise-tables-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        fs::write(dir.join("fy2024-25-new.json"), BUILTIN_TABLES[3].1).expect("write table");
        fs::write(dir.join("README.txt"), "ignored").expect("write note");

        let registry = RateTableRegistry::load_dir(&dir).expect("loads");
        fs::remove_dir_all(&dir).ok();

        assert_eq!(
            registry.entries().collect::<Vec<_>>(),
            vec![(fy(2024), Regime::New)]
        );
    }
}
