use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::rate_table::{AgeBasis, RateTable};
use super::types::{ClampReason, DeductionLine, DeductionSection, Money, TaxInputProfile};

#[derive(Clone, Debug, PartialEq)]
pub struct DeductionOutcome {
    pub total: Money,
    pub lines: BTreeMap<DeductionSection, DeductionLine>,
}

/// Clamps every claim to `[0, cap]` for its section and sums what is allowed.
/// Caps come from the table and depend on age, relationship and entity type.
pub fn aggregate_deductions(table: &RateTable, profile: &TaxInputProfile) -> DeductionOutcome {
    if !table.itemized_deductions {
        return suppressed_claims(profile);
    }

    let mut total = Decimal::ZERO;
    let mut lines = BTreeMap::new();
    for (&section, &claimed) in &profile.deduction_claims {
        let rule = table.deduction_rule(section);
        let age = match rule.map(|r| r.age_basis) {
            Some(AgeBasis::Parents) => profile.parents_age.unwrap_or(0),
            _ => profile.age,
        };
        let cap = table.cap_for(section, age, profile.entity_type);
        let clamped = cap.clamp(claimed);
        let share = rule.map_or(Decimal::ONE, |r| r.eligible_share);
        let allowed = clamped * share;

        let clamp = if claimed < Decimal::ZERO {
            Some(ClampReason::NegativeAmount)
        } else if claimed == Decimal::ZERO {
            None
        } else if rule.is_none() {
            Some(ClampReason::NotAllowedInRegime)
        } else if rule.is_some_and(|r| !r.entities.contains(&profile.entity_type)) {
            Some(ClampReason::IneligibleEntity)
        } else if clamped < claimed {
            Some(ClampReason::SectionCap)
        } else {
            None
        };

        total += allowed;
        lines.insert(
            section,
            DeductionLine {
                claimed,
                allowed,
                cap: cap.limit(),
                clamp,
            },
        );
    }

    DeductionOutcome { total, lines }
}

/// Audit lines for a regime that honours no itemised claims.
pub fn suppressed_claims(profile: &TaxInputProfile) -> DeductionOutcome {
    let lines = profile
        .deduction_claims
        .iter()
        .map(|(&section, &claimed)| {
            let clamp = if claimed < Decimal::ZERO {
                Some(ClampReason::NegativeAmount)
            } else if claimed > Decimal::ZERO {
                Some(ClampReason::NotAllowedInRegime)
            } else {
                None
            };
            let line = DeductionLine {
                claimed,
                allowed: Decimal::ZERO,
                cap: Some(Decimal::ZERO),
                clamp,
            };
            (section, line)
        })
        .collect();
    DeductionOutcome {
        total: Decimal::ZERO,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate_table::{Cap, RateTableRegistry};
    use crate::core::types::{EntityType, FiscalYear, Regime};
    use proptest::prelude::{prop_assert, proptest};
    use rust_decimal_macros::dec;

    fn old_table() -> RateTable {
        RateTableRegistry::builtin()
            .expect("built-in tables are valid")
            .for_year(FiscalYear::starting(2023), Regime::Old)
            .expect("registered")
            .clone()
    }

    fn profile_with(claims: &[(DeductionSection, Money)]) -> TaxInputProfile {
        let mut profile = TaxInputProfile::new(EntityType::Individual, 45, dec!(1200000));
        profile.deduction_claims = claims.iter().copied().collect();
        profile
    }

    #[test]
    fn claim_above_cap_is_clamped_and_audited() {
        let table = old_table();
        let outcome = aggregate_deductions(
            &table,
            &profile_with(&[(DeductionSection::Sec80C, dec!(200000))]),
        );
        assert_eq!(outcome.total, dec!(150000));
        let line = &outcome.lines[&DeductionSection::Sec80C];
        assert_eq!(line.allowed, dec!(150000));
        assert_eq!(line.cap, Some(dec!(150000)));
        assert_eq!(line.clamp, Some(ClampReason::SectionCap));
    }

    #[test]
    fn negative_claim_counts_as_no_claim() {
        let table = old_table();
        let outcome = aggregate_deductions(
            &table,
            &profile_with(&[
                (DeductionSection::Sec80C, dec!(-5000)),
                (DeductionSection::Sec24B, dec!(100000)),
            ]),
        );
        assert_eq!(outcome.total, dec!(100000));
        let line = &outcome.lines[&DeductionSection::Sec80C];
        assert_eq!(line.allowed, Decimal::ZERO);
        assert_eq!(line.clamp, Some(ClampReason::NegativeAmount));
        assert_eq!(outcome.lines[&DeductionSection::Sec24B].clamp, None);
    }

    #[test]
    fn self_and_parents_health_caps_are_independent_and_additive() {
        let table = old_table();
        let mut profile = profile_with(&[
            (DeductionSection::Sec80DSelf, dec!(40000)),
            (DeductionSection::Sec80DParents, dec!(60000)),
        ]);
        profile.parents_age = Some(72);
        let outcome = aggregate_deductions(&table, &profile);
        assert_eq!(outcome.lines[&DeductionSection::Sec80DSelf].allowed, dec!(25000));
        assert_eq!(outcome.lines[&DeductionSection::Sec80DParents].allowed, dec!(50000));
        assert_eq!(outcome.total, dec!(75000));

        profile.parents_age = None;
        let outcome = aggregate_deductions(&table, &profile);
        assert_eq!(outcome.lines[&DeductionSection::Sec80DParents].allowed, dec!(25000));
    }

    #[test]
    fn senior_taxpayer_gets_higher_health_and_interest_caps() {
        let table = old_table();
        let mut profile = profile_with(&[
            (DeductionSection::Sec80DSelf, dec!(60000)),
            (DeductionSection::SavingsInterest, dec!(60000)),
        ]);
        profile.age = 65;
        let outcome = aggregate_deductions(&table, &profile);
        assert_eq!(outcome.total, dec!(100000));
    }

    #[test]
    fn uncapped_section_and_half_share_donation() {
        let table = old_table();
        let outcome = aggregate_deductions(
            &table,
            &profile_with(&[
                (DeductionSection::Sec80E, dec!(375000)),
                (DeductionSection::Sec80G50, dec!(30000)),
            ]),
        );
        assert_eq!(outcome.lines[&DeductionSection::Sec80E].cap, None);
        assert_eq!(outcome.lines[&DeductionSection::Sec80G50].allowed, dec!(15000));
        assert_eq!(outcome.total, dec!(390000));
    }

    #[test]
    fn huf_cannot_claim_individual_only_sections() {
        let table = old_table();
        let mut profile = profile_with(&[
            (DeductionSection::Sec80Ccd1B, dec!(50000)),
            (DeductionSection::Sec80C, dec!(90000)),
        ]);
        profile.entity_type = EntityType::Huf;
        let outcome = aggregate_deductions(&table, &profile);
        assert_eq!(outcome.total, dec!(90000));
        assert_eq!(
            outcome.lines[&DeductionSection::Sec80Ccd1B].clamp,
            Some(ClampReason::IneligibleEntity)
        );
    }

    #[test]
    fn section_missing_from_table_is_not_allowed_in_regime() {
        let mut table = old_table();
        table
            .deductions
            .retain(|rule| rule.section != DeductionSection::Sec80E);
        let outcome = aggregate_deductions(
            &table,
            &profile_with(&[
                (DeductionSection::Sec80E, dec!(40000)),
                (DeductionSection::Sec24B, dec!(0)),
            ]),
        );
        assert_eq!(outcome.total, Decimal::ZERO);
        let line = &outcome.lines[&DeductionSection::Sec80E];
        assert_eq!(line.allowed, Decimal::ZERO);
        assert_eq!(line.clamp, Some(ClampReason::NotAllowedInRegime));
        assert_eq!(outcome.lines[&DeductionSection::Sec24B].clamp, None);
    }

    #[test]
    fn new_regime_suppresses_all_claims() {
        let table = RateTableRegistry::builtin()
            .expect("built-in tables are valid")
            .for_year(FiscalYear::starting(2023), Regime::New)
            .expect("registered")
            .clone();
        let outcome = aggregate_deductions(
            &table,
            &profile_with(&[(DeductionSection::Sec80C, dec!(150000))]),
        );
        assert_eq!(outcome.total, Decimal::ZERO);
        assert_eq!(
            outcome.lines[&DeductionSection::Sec80C].clamp,
            Some(ClampReason::NotAllowedInRegime)
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn total_never_exceeds_sum_of_section_caps(
            c80c in -1_000_000i64..5_000_000,
            d_self in -1_000_000i64..5_000_000,
            d_parents in -1_000_000i64..5_000_000,
            nps in -1_000_000i64..5_000_000,
            home in -1_000_000i64..5_000_000,
            ptax in -1_000_000i64..5_000_000,
            age in 0u32..100,
            parents_age in 0u32..110,
        ) {
            let table = old_table();
            let sections = [
                (DeductionSection::Sec80C, Decimal::from(c80c)),
                (DeductionSection::Sec80DSelf, Decimal::from(d_self)),
                (DeductionSection::Sec80DParents, Decimal::from(d_parents)),
                (DeductionSection::Sec80Ccd1B, Decimal::from(nps)),
                (DeductionSection::Sec24B, Decimal::from(home)),
                (DeductionSection::ProfessionalTax, Decimal::from(ptax)),
            ];
            let mut profile = profile_with(&sections);
            profile.age = age;
            profile.parents_age = Some(parents_age);

            let outcome = aggregate_deductions(&table, &profile);
            let mut cap_sum = Decimal::ZERO;
            for (section, _) in sections {
                let line = &outcome.lines[&section];
                prop_assert!(line.allowed >= Decimal::ZERO);
                let cap = line.cap.expect("capped section");
                prop_assert!(line.allowed <= cap);
                cap_sum += cap;
            }
            prop_assert!(outcome.total <= cap_sum);
            prop_assert!(cap_sum <= dec!(502500));
            prop_assert!(matches!(
                table.cap_for(DeductionSection::Sec80C, age, EntityType::Individual),
                Cap::Limit(_)
            ));
        }
    }
}
