//! Provision resolution.
//!
//! Exposure-level provisions apply to their exposure only; facility and
//! counterparty provisions are spread pro-rata over the members' gross
//! exposure. Layers add up. Standardised exposures then deduct the allocation
//! from the drawn balance first and the undrawn nominal second; IRB and
//! slotting exposures keep the allocation for the expected-loss comparison
//! without deducting it.

use rust_decimal::Decimal;

use super::arena::{allocate_pro_rata, GroupIndex};
use super::{record_warning, ProvisionResolver, StageOutput};
use crate::config::CrmConfig;
use crate::error::CrmError;
use crate::model::{AdjustedExposure, BeneficiaryLevel, Provision};
use crate::parallel::parallel_map;
use crate::types::{CrmWarning, Money, WarningCode};
use crate::CrmResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardProvisionResolver;

impl ProvisionResolver for StandardProvisionResolver {
    fn resolve(
        &self,
        exposures: &[AdjustedExposure],
        index: &GroupIndex,
        provisions: &[Provision],
        config: &CrmConfig,
    ) -> CrmResult<StageOutput> {
        let mut warnings = Vec::new();
        let allocated = allocate_provisions(exposures, index, provisions, &mut warnings)?;

        let inputs: Vec<(&AdjustedExposure, Money)> =
            exposures.iter().zip(allocated).collect();
        let exposures = parallel_map(&inputs, config.parallel_threshold, |(e, amount)| {
            deduct_provision(e, *amount)
        });

        Ok(StageOutput {
            exposures,
            warnings,
        })
    }
}

/// Total provision allocated to each exposure, by batch position.
fn allocate_provisions(
    exposures: &[AdjustedExposure],
    index: &GroupIndex,
    provisions: &[Provision],
    warnings: &mut Vec<CrmWarning>,
) -> CrmResult<Vec<Money>> {
    let mut allocated = vec![Decimal::ZERO; exposures.len()];

    for p in provisions {
        if p.amount < Decimal::ZERO {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::NegativeAmount,
                    format!("Provision {} has negative amount {}; ignored", p.provision_reference, p.amount),
                ),
            );
            continue;
        }
        let Some(members) = index.members(p.beneficiary_level, &p.beneficiary_reference) else {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::UnmatchedProvision,
                    format!(
                        "Provision {} references unknown {} {}",
                        p.provision_reference, p.beneficiary_level, p.beneficiary_reference
                    ),
                ),
            );
            continue;
        };

        if p.beneficiary_level == BeneficiaryLevel::Exposure {
            allocated[members[0]] += p.amount;
            continue;
        }

        let weights: Vec<Money> = members
            .iter()
            .map(|&i| exposures[i].exposure.gross_amount())
            .collect();
        let Some(shares) = allocate_pro_rata(p.amount, &weights) else {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::ZeroPoolTotal,
                    format!(
                        "Provision {}: {} {} has zero gross exposure; nothing allocated",
                        p.provision_reference, p.beneficiary_level, p.beneficiary_reference
                    ),
                ),
            );
            continue;
        };
        let total: Money = shares.iter().copied().sum();
        if total != p.amount {
            return Err(CrmError::InvariantViolation(format!(
                "provision {} allocated {total} of {}",
                p.provision_reference, p.amount
            )));
        }
        for (&i, share) in members.iter().zip(shares) {
            allocated[i] += share;
        }
    }
    Ok(allocated)
}

/// Apply the allocated provision to one exposure.
pub(crate) fn deduct_provision(e: &AdjustedExposure, allocated: Money) -> AdjustedExposure {
    let exp = &e.exposure;
    let mut out = e.clone();
    let nominal = exp.nominal_amount.max(Decimal::ZERO);
    out.provision_allocated = allocated;

    if !exp.approach.deducts_provisions() {
        out.provision_on_drawn = Decimal::ZERO;
        out.provision_on_nominal = Decimal::ZERO;
        out.provision_deducted = Decimal::ZERO;
        out.nominal_after_provision = nominal;
        return out;
    }

    let on_drawn = allocated.min(exp.drawn_amount.max(Decimal::ZERO));
    let on_nominal = allocated - on_drawn;
    out.provision_on_drawn = on_drawn;
    out.provision_on_nominal = on_nominal;
    out.nominal_after_provision = (nominal - on_nominal).max(Decimal::ZERO);
    out.provision_deducted = on_drawn + on_nominal.min(nominal);

    if on_nominal > nominal {
        record_warning(
            &mut out.warnings,
            CrmWarning::exposure(
                WarningCode::ProvisionExceedsExposure,
                &exp.exposure_reference,
                format!(
                    "Provision {} exceeds drawn and undrawn amounts; excess {} not deducted",
                    allocated,
                    on_nominal - nominal
                ),
            ),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Approach, Exposure};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    // -- Helpers --

    fn config() -> CrmConfig {
        CrmConfig::crr(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap())
    }

    fn record(reference: &str, facility: Option<&str>, drawn: Money, nominal: Money) -> AdjustedExposure {
        let mut e = Exposure::new(reference, "C1");
        e.facility_reference = facility.map(str::to_string);
        e.drawn_amount = drawn;
        e.nominal_amount = nominal;
        AdjustedExposure::from_exposure(e)
    }

    fn provision(reference: &str, level: BeneficiaryLevel, target: &str, amount: Money) -> Provision {
        Provision {
            provision_reference: reference.into(),
            beneficiary_level: level,
            beneficiary_reference: target.into(),
            amount,
        }
    }

    fn run(batch: &[AdjustedExposure], provisions: &[Provision]) -> StageOutput {
        let index = GroupIndex::build(batch).unwrap();
        StandardProvisionResolver
            .resolve(batch, &index, provisions, &config())
            .unwrap()
    }

    // -- Test: drawn-first deduction --

    #[test]
    fn test_drawn_first_split() {
        let batch = vec![record("E1", None, dec!(300), dec!(1000))];
        let out = run(&batch, &[provision("P1", BeneficiaryLevel::Exposure, "E1", dec!(500))]);
        let e = &out.exposures[0];
        assert_eq!(e.provision_on_drawn, dec!(300));
        assert_eq!(e.provision_on_nominal, dec!(200));
        assert_eq!(e.nominal_after_provision, dec!(800));
        assert_eq!(e.provision_deducted, dec!(500));
    }

    #[test]
    fn test_irb_retains_without_deducting() {
        let mut batch = vec![record("E1", None, dec!(300), dec!(1000))];
        batch[0].exposure.approach = Approach::FoundationIrb;
        let out = run(&batch, &[provision("P1", BeneficiaryLevel::Exposure, "E1", dec!(500))]);
        let e = &out.exposures[0];
        assert_eq!(e.provision_allocated, dec!(500));
        assert_eq!(e.provision_on_drawn, dec!(0));
        assert_eq!(e.provision_on_nominal, dec!(0));
        assert_eq!(e.nominal_after_provision, dec!(1000));
    }

    #[test]
    fn test_excess_provision_flagged() {
        let batch = vec![record("E1", None, dec!(100), dec!(50))];
        let out = run(&batch, &[provision("P1", BeneficiaryLevel::Exposure, "E1", dec!(200))]);
        let e = &out.exposures[0];
        assert_eq!(e.nominal_after_provision, dec!(0));
        assert_eq!(e.provision_deducted, dec!(150));
        assert_eq!(e.warnings[0].code, WarningCode::ProvisionExceedsExposure);
    }

    // -- Test: pooled allocation --

    #[test]
    fn test_facility_pro_rata_by_gross() {
        let batch = vec![
            record("E1", Some("F1"), dec!(300), dec!(0)),
            record("E2", Some("F1"), dec!(100), dec!(0)),
        ];
        let out = run(&batch, &[provision("P1", BeneficiaryLevel::Facility, "F1", dec!(40))]);
        assert_eq!(out.exposures[0].provision_allocated, dec!(30));
        assert_eq!(out.exposures[1].provision_allocated, dec!(10));
    }

    #[test]
    fn test_layers_are_additive() {
        let batch = vec![
            record("E1", Some("F1"), dec!(100), dec!(0)),
            record("E2", Some("F1"), dec!(100), dec!(0)),
        ];
        let out = run(
            &batch,
            &[
                provision("P1", BeneficiaryLevel::Exposure, "E1", dec!(5)),
                provision("P2", BeneficiaryLevel::Facility, "F1", dec!(10)),
                provision("P3", BeneficiaryLevel::Counterparty, "C1", dec!(20)),
            ],
        );
        assert_eq!(out.exposures[0].provision_allocated, dec!(20));
        assert_eq!(out.exposures[1].provision_allocated, dec!(15));
    }

    #[test]
    fn test_zero_pool_warns() {
        let batch = vec![record("E1", Some("F1"), dec!(0), dec!(0))];
        let out = run(&batch, &[provision("P1", BeneficiaryLevel::Facility, "F1", dec!(10))]);
        assert_eq!(out.exposures[0].provision_allocated, dec!(0));
        assert_eq!(out.warnings[0].code, WarningCode::ZeroPoolTotal);
    }

    #[test]
    fn test_unmatched_and_negative_excluded() {
        let batch = vec![record("E1", None, dec!(100), dec!(0))];
        let out = run(
            &batch,
            &[
                provision("P1", BeneficiaryLevel::Exposure, "E9", dec!(10)),
                provision("P2", BeneficiaryLevel::Exposure, "E1", dec!(-10)),
            ],
        );
        assert_eq!(out.exposures[0].provision_allocated, dec!(0));
        let codes: Vec<WarningCode> = out.warnings.iter().map(|w| w.code).collect();
        assert_eq!(codes, vec![WarningCode::UnmatchedProvision, WarningCode::NegativeAmount]);
    }
}
