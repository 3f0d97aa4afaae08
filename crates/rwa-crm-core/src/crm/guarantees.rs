//! Guarantor substitution.
//!
//! Guarantees are resolved to covered amounts per exposure (pro-rata by EAD
//! for facility and counterparty protection), ranked by the guarantor's risk
//! weight, and consume what collateral left uncovered. A guarantee only
//! counts when the guarantor's weight is strictly below the obligor's.
//!
//! Under Basel 3.1 a guarantor the firm may rate internally, and who carries
//! an internal PD, is treated as internally rated: the guaranteed portion of
//! an IRB exposure is recorded for parameter substitution (guarantor PD,
//! supervisory LGD, own maturity) instead of weight substitution, one record
//! per guarantee with the amount it covers. When an
//! IRB exposure is guaranteed by a standardised guarantor, the guaranteed
//! EAD is restated with the standardised CCF.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::arena::{allocate_pro_rata, GroupIndex};
use super::collateral::obligor_lgd;
use super::{record_warning, GuaranteeSubstitutor, StageOutput};
use crate::capital::{CapitalFormula, IrbParameters};
use crate::config::CrmConfig;
use crate::model::{
    AdjustedExposure, Approach, BeneficiaryLevel, Exposure, Guarantee, GuaranteeApplication,
    GuarantorProfile, GuarantorTreatment, ParameterSubstitution, Seniority,
};
use crate::parallel::parallel_map;
use crate::tables::ccf::sa_ccf;
use crate::tables::haircuts::maturity_mismatch_factor;
use crate::tables::risk_weights::{guarantor_risk_weight, obligor_risk_weight, supervisory_lgd};
use crate::types::{CrmWarning, Money, Rate, WarningCode, Years};
use crate::CrmResult;

/// Standard substitution backed by a capital formula for risk-weight
/// equivalents of internally rated parties.
pub struct StandardGuaranteeSubstitution {
    formula: Box<dyn CapitalFormula>,
}

impl StandardGuaranteeSubstitution {
    pub fn new(formula: Box<dyn CapitalFormula>) -> Self {
        Self { formula }
    }
}

type Cover<'a> = (&'a Guarantee, &'a GuarantorProfile, Money);

impl GuaranteeSubstitutor for StandardGuaranteeSubstitution {
    fn substitute(
        &self,
        exposures: &[AdjustedExposure],
        index: &GroupIndex,
        guarantees: &[Guarantee],
        guarantors: &[GuarantorProfile],
        config: &CrmConfig,
    ) -> CrmResult<StageOutput> {
        let mut warnings = Vec::new();
        let profiles: BTreeMap<&str, &GuarantorProfile> = guarantors
            .iter()
            .map(|g| (g.counterparty_reference.as_str(), g))
            .collect();
        let covers = distribute(exposures, index, guarantees, &profiles, &mut warnings);

        let inputs: Vec<(&AdjustedExposure, Vec<Cover>)> = exposures.iter().zip(covers).collect();
        let results = parallel_map(&inputs, config.parallel_threshold, |(e, covers)| {
            self.apply(e, covers, config)
        });
        let exposures = results.into_iter().collect::<CrmResult<Vec<_>>>()?;

        Ok(StageOutput {
            exposures,
            warnings,
        })
    }
}

// ---------------------------------------------------------------------------
// Level resolution
// ---------------------------------------------------------------------------

fn distribute<'a>(
    exposures: &[AdjustedExposure],
    index: &GroupIndex,
    guarantees: &'a [Guarantee],
    profiles: &BTreeMap<&str, &'a GuarantorProfile>,
    warnings: &mut Vec<CrmWarning>,
) -> Vec<Vec<Cover<'a>>> {
    let mut covers: Vec<Vec<Cover>> = vec![Vec::new(); exposures.len()];

    for g in guarantees {
        let Some(members) = index.members(g.beneficiary_level, &g.protected_reference) else {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::UnmatchedGuarantee,
                    format!(
                        "Guarantee {} references unknown {} {}",
                        g.guarantee_reference, g.beneficiary_level, g.protected_reference
                    ),
                ),
            );
            continue;
        };
        let Some(profile) = profiles.get(g.guarantor_reference.as_str()).copied() else {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::UnknownGuarantor,
                    format!(
                        "Guarantee {} names guarantor {} with no rating profile; ignored",
                        g.guarantee_reference, g.guarantor_reference
                    ),
                ),
            );
            continue;
        };

        let eads: Vec<Money> = members.iter().map(|&i| exposures[i].ead_pre_crm).collect();
        let Some(amounts) = covered_amounts(g, &eads, warnings) else {
            continue;
        };
        for (&i, amount) in members.iter().zip(amounts) {
            if amount > Decimal::ZERO {
                covers[i].push((g, profile, amount));
            }
        }
    }
    covers
}

/// Protection allocated to each member before adjustments.
fn covered_amounts(
    g: &Guarantee,
    eads: &[Money],
    warnings: &mut Vec<CrmWarning>,
) -> Option<Vec<Money>> {
    match (g.covered_amount, g.percentage_covered) {
        (Some(amount), _) if amount < Decimal::ZERO => {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::NegativeAmount,
                    format!("Guarantee {} has negative amount {amount}; ignored", g.guarantee_reference),
                ),
            );
            None
        }
        (Some(amount), _) if g.beneficiary_level == BeneficiaryLevel::Exposure => Some(vec![amount]),
        (Some(amount), _) => {
            let shares = allocate_pro_rata(amount, eads);
            if shares.is_none() {
                record_warning(
                    warnings,
                    CrmWarning::batch(
                        WarningCode::ZeroPoolTotal,
                        format!(
                            "Guarantee {}: {} {} has zero EAD; nothing allocated",
                            g.guarantee_reference, g.beneficiary_level, g.protected_reference
                        ),
                    ),
                );
            }
            shares
        }
        (None, Some(pct)) => {
            let clamped = pct.clamp(Decimal::ZERO, Decimal::ONE);
            if clamped != pct {
                record_warning(
                    warnings,
                    CrmWarning::batch(
                        WarningCode::CoverageOutOfRange,
                        format!(
                            "Guarantee {} percentage {pct} outside [0, 1]; clamped",
                            g.guarantee_reference
                        ),
                    ),
                );
            }
            Some(eads.iter().map(|ead| *ead * clamped).collect())
        }
        (None, None) => {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::MissingGuaranteeAmount,
                    format!("Guarantee {} has no covered amount or percentage", g.guarantee_reference),
                ),
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Per-exposure substitution
// ---------------------------------------------------------------------------

/// A guarantee ranked for consumption.
struct Candidate<'a> {
    guarantee: &'a Guarantee,
    profile: &'a GuarantorProfile,
    covered: Money,
    treatment: GuarantorTreatment,
    risk_weight: Rate,
    pd: Option<Rate>,
}

impl StandardGuaranteeSubstitution {
    fn apply(
        &self,
        e: &AdjustedExposure,
        covers: &[Cover],
        config: &CrmConfig,
    ) -> CrmResult<AdjustedExposure> {
        let exp = &e.exposure;
        let mut out = e.clone();
        // Collateral has already set both LGDs for internally rated exposures.
        let lgd = match (exp.approach.is_irb(), e.lgd_post_crm) {
            (false, _) => None,
            (true, Some(lgd)) => Some(lgd),
            (true, None) => {
                let lgd = obligor_lgd(exp, config, &mut out.warnings);
                out.lgd_pre_crm = Some(lgd);
                out.lgd_post_crm = Some(lgd);
                Some(lgd)
            }
        };
        out.obligor_risk_weight = self.obligor_weight(exp, lgd, !covers.is_empty(), config, &mut out.warnings)?;

        let net = e.net_exposure_after_collateral;
        if covers.is_empty() {
            out.guaranteed_portion = Decimal::ZERO;
            out.unguaranteed_portion = net;
            out.ead_guaranteed = Decimal::ZERO;
            out.ead_unguaranteed = net;
            return Ok(out);
        }

        let mut candidates = covers
            .iter()
            .map(|(g, profile, covered)| self.rank(g, profile, *covered, exp, config))
            .collect::<CrmResult<Vec<_>>>()?;
        candidates.sort_by(|a, b| {
            a.risk_weight
                .cmp(&b.risk_weight)
                .then_with(|| a.guarantee.guarantee_reference.cmp(&b.guarantee.guarantee_reference))
        });

        // Simple-method secured amounts are already covered by collateral.
        let mut remaining = (net - e.collateral_secured_portion).max(Decimal::ZERO);
        let mut applications = Vec::new();
        for c in candidates {
            let beneficial = out.obligor_risk_weight.is_some_and(|rw| c.risk_weight < rw);
            if !beneficial {
                record_warning(
                    &mut out.warnings,
                    CrmWarning::exposure(
                        WarningCode::NonBeneficialGuarantee,
                        &exp.exposure_reference,
                        format!(
                            "Guarantee {} from {} (weight {}) does not improve on the obligor; not applied",
                            c.guarantee.guarantee_reference,
                            c.profile.counterparty_reference,
                            c.risk_weight.round_dp(6)
                        ),
                    ),
                );
                continue;
            }

            let maturity_adjustment = guarantee_maturity_factor(c.guarantee, exp, config, &mut out.warnings);
            let fx_haircut = match &c.guarantee.currency {
                Some(ccy) if *ccy != exp.currency => config.fx_haircut,
                _ => Decimal::ZERO,
            };
            let protection = c.covered * maturity_adjustment * (Decimal::ONE - fx_haircut);
            let applied = protection.min(remaining).max(Decimal::ZERO);
            if applied.is_zero() {
                continue;
            }
            remaining -= applied;
            applications.push(GuaranteeApplication {
                guarantee_reference: c.guarantee.guarantee_reference.clone(),
                guarantor_reference: c.profile.counterparty_reference.clone(),
                treatment: c.treatment,
                risk_weight: c.risk_weight,
                probability_of_default: c.pd,
                covered_amount: c.covered,
                maturity_adjustment,
                fx_haircut,
                amount_applied: applied,
            });
        }

        let guaranteed: Money = applications.iter().map(|a| a.amount_applied).sum();
        out.guaranteed_portion = guaranteed;
        out.unguaranteed_portion = net - guaranteed;
        out.ead_guaranteed = guaranteed;
        out.ead_unguaranteed = out.unguaranteed_portion;

        if let Some(primary) = applications.first() {
            out.guarantor_reference = Some(primary.guarantor_reference.clone());
            out.guarantor_treatment = primary.treatment;
            out.guarantor_risk_weight_or_pd = match primary.treatment {
                GuarantorTreatment::InternallyRated => primary.probability_of_default,
                _ => Some(primary.risk_weight),
            };
        }

        if exp.approach.is_irb() {
            restate_cross_approach(&mut out, &applications, config);
            out.parameter_substitutions = applications
                .iter()
                .filter(|a| a.treatment == GuarantorTreatment::InternallyRated)
                .filter_map(|a| {
                    Some(ParameterSubstitution {
                        guarantee_reference: a.guarantee_reference.clone(),
                        guarantor_reference: a.guarantor_reference.clone(),
                        probability_of_default: a.probability_of_default?,
                        loss_given_default: supervisory_lgd(Seniority::Senior, config.framework),
                        maturity_years: exp.maturity_years,
                        amount_applied: a.amount_applied,
                    })
                })
                .collect();
        }

        out.guarantee_applications = applications;
        Ok(out)
    }

    /// Treatment and comparison weight of one guarantee.
    fn rank<'a>(
        &self,
        guarantee: &'a Guarantee,
        profile: &'a GuarantorProfile,
        covered: Money,
        exp: &Exposure,
        config: &CrmConfig,
    ) -> CrmResult<Candidate<'a>> {
        let class = profile.exposure_class();
        let internal_pd = profile
            .internal_pd
            .filter(|_| config.is_basel_3_1() && config.has_irb_permission(class));

        let (treatment, risk_weight) = match internal_pd {
            Some(pd) => {
                let rw = self.formula.risk_weight(&IrbParameters {
                    probability_of_default: pd,
                    loss_given_default: supervisory_lgd(Seniority::Senior, config.framework),
                    maturity_years: exp.maturity_years,
                    exposure_class: class,
                })?;
                (GuarantorTreatment::InternallyRated, rw)
            }
            None => (
                GuarantorTreatment::Standardised,
                guarantor_risk_weight(
                    profile.entity_type,
                    profile.credit_quality_step,
                    config.uk_institution_deviation,
                ),
            ),
        };
        Ok(Candidate {
            guarantee,
            profile,
            covered,
            treatment,
            risk_weight,
            pd: internal_pd,
        })
    }

    /// Obligor weight the beneficial test compares against.
    fn obligor_weight(
        &self,
        exp: &Exposure,
        lgd: Option<Rate>,
        guaranteed: bool,
        config: &CrmConfig,
        warnings: &mut Vec<CrmWarning>,
    ) -> CrmResult<Option<Rate>> {
        match exp.approach {
            Approach::Standardised | Approach::Slotting => Ok(Some(exp.risk_weight.unwrap_or_else(|| {
                obligor_risk_weight(
                    exp.exposure_class,
                    exp.credit_quality_step,
                    config.uk_institution_deviation,
                )
            }))),
            Approach::FoundationIrb | Approach::AdvancedIrb => {
                if !guaranteed {
                    return Ok(None);
                }
                let (Some(pd), Some(lgd)) = (exp.probability_of_default, lgd) else {
                    record_warning(
                        warnings,
                        CrmWarning::exposure(
                            WarningCode::MissingProbabilityOfDefault,
                            &exp.exposure_reference,
                            "No obligor PD; guarantee benefit cannot be tested and is not applied",
                        ),
                    );
                    return Ok(None);
                };
                self.formula
                    .risk_weight(&IrbParameters {
                        probability_of_default: pd,
                        loss_given_default: lgd,
                        maturity_years: exp.maturity_years,
                        exposure_class: exp.exposure_class,
                    })
                    .map(Some)
            }
        }
    }
}

/// Residual maturity of the protection in years from the reporting date.
fn residual_years(g: &Guarantee, config: &CrmConfig) -> Option<Years> {
    let maturity = g.maturity_date?;
    let days = (maturity - config.reporting_date).num_days();
    Some(Decimal::from(days) / dec!(365))
}

fn guarantee_maturity_factor(
    g: &Guarantee,
    exp: &Exposure,
    config: &CrmConfig,
    warnings: &mut Vec<CrmWarning>,
) -> Rate {
    let Some(t) = residual_years(g, config) else {
        return Decimal::ONE;
    };
    let factor = maturity_mismatch_factor(t, exp.maturity_years);
    if factor < Decimal::ONE {
        record_warning(
            warnings,
            CrmWarning::exposure(
                WarningCode::GuaranteeMaturityMismatch,
                &exp.exposure_reference,
                format!(
                    "Guarantee {} residual {}y against exposure {}y; factor {}",
                    g.guarantee_reference,
                    t.round_dp(4),
                    exp.maturity_years,
                    factor.round_dp(6)
                ),
            ),
        );
    }
    factor
}

/// Restate the standardised-guaranteed part of an IRB exposure at the SA CCF.
///
/// The guaranteed share of EAD is scaled by the ratio of the exposure's EAD
/// at the SA CCF to its EAD at its own CCF; the unguaranteed part keeps the
/// exposure's CCF.
fn restate_cross_approach(
    out: &mut AdjustedExposure,
    applications: &[GuaranteeApplication],
    config: &CrmConfig,
) {
    let sa_applied: Money = applications
        .iter()
        .filter(|a| a.treatment == GuarantorTreatment::Standardised)
        .map(|a| a.amount_applied)
        .sum();
    if sa_applied.is_zero() || out.ead_pre_crm <= Decimal::ZERO {
        return;
    }
    let exp = &out.exposure;
    let ccf_sa = if exp.nominal_amount <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        sa_ccf(exp.risk_category, config.framework)
    };
    let on_balance = exp.drawn_amount.max(Decimal::ZERO) - out.provision_on_drawn
        + exp.accrued_interest.max(Decimal::ZERO);
    let ead_at_sa_ccf = on_balance + out.nominal_after_provision * ccf_sa;

    let restated = sa_applied * ead_at_sa_ccf / out.ead_pre_crm;
    out.ead_guaranteed = out.guaranteed_portion - sa_applied + restated;
    out.ccf_guaranteed = ccf_sa;
}
