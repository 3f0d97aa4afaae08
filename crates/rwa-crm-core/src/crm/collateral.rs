//! Collateral allocation and netting.
//!
//! Each collateral item is valued (market value, or a pledge percentage of
//! the level's pre-CRM EAD) and split pro-rata by EAD over the exposures at
//! its level. Every share is then haircut per exposure, since currency and
//! maturity mismatch depend on the exposure it secures.
//!
//! Comprehensive method:
//! `adjusted = share × (1 − H) × (1 − Hfx) × maturity factor`,
//! `effectively secured = adjusted / overcollateralisation ratio`, real
//! estate and other physical shares below 30% of EAD are dropped, and the
//! remainder nets the exposure in priority order: financial, real estate,
//! then receivables and other physical.
//!
//! Only standardised exposures are netted. Internally rated and slotting
//! exposures keep their EAD; for F-IRB the recognised collateral instead
//! lowers LGD to a blend of the supervisory LGDs of the secured parts
//! (financial 0, receivables and real estate 35% or 20%, other physical 40%
//! or 25%) and the unsecured LGD of the rest.
//!
//! Simple method (standardised exposures only): financial collateral at
//! market value splits the EAD into a collateral-weighted secured portion
//! and an obligor-weighted remainder, without netting.

use rust_decimal::Decimal;

use super::arena::{allocate_pro_rata, GroupIndex};
use super::{record_warning, CollateralAllocator, StageOutput};
use crate::config::{CollateralMethod, CrmConfig, RegulatoryFramework};
use crate::error::CrmError;
use crate::model::{
    AdjustedExposure, Approach, BeneficiaryLevel, Collateral, CollateralAllocation,
    CollateralCategory, Exposure,
};
use crate::parallel::parallel_map;
use crate::tables::haircuts::{
    maturity_mismatch_factor, minimum_coverage, overcollateralisation_ratio, supervisory_haircut,
};
use crate::tables::risk_weights::{collateral_lgd, simple_method_collateral_weight, supervisory_lgd};
use crate::types::{CrmWarning, Money, Rate, WarningCode};
use crate::CrmResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCollateralAllocator;

impl CollateralAllocator for StandardCollateralAllocator {
    fn allocate(
        &self,
        exposures: &[AdjustedExposure],
        index: &GroupIndex,
        collateral: &[Collateral],
        config: &CrmConfig,
    ) -> CrmResult<StageOutput> {
        let mut warnings = Vec::new();
        let shares = distribute(exposures, index, collateral, &mut warnings)?;

        let inputs: Vec<(&AdjustedExposure, Vec<(&Collateral, Money)>)> =
            exposures.iter().zip(shares).collect();
        let exposures = parallel_map(&inputs, config.parallel_threshold, |(e, items)| {
            if uses_simple_method(e, config) {
                apply_simple(e, items)
            } else {
                apply_comprehensive(e, items, config)
            }
        });

        Ok(StageOutput {
            exposures,
            warnings,
        })
    }
}

fn uses_simple_method(e: &AdjustedExposure, config: &CrmConfig) -> bool {
    config.collateral_method == CollateralMethod::Simple
        && e.exposure.approach == Approach::Standardised
}

// ---------------------------------------------------------------------------
// Level resolution
// ---------------------------------------------------------------------------

/// Market value shares of each collateral item, by batch position.
fn distribute<'a>(
    exposures: &[AdjustedExposure],
    index: &GroupIndex,
    collateral: &'a [Collateral],
    warnings: &mut Vec<CrmWarning>,
) -> CrmResult<Vec<Vec<(&'a Collateral, Money)>>> {
    let mut shares: Vec<Vec<(&Collateral, Money)>> = vec![Vec::new(); exposures.len()];

    for c in collateral {
        let Some(members) = index.members(c.beneficiary_level, &c.beneficiary_reference) else {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::UnmatchedCollateral,
                    format!(
                        "Collateral {} references unknown {} {}",
                        c.collateral_reference, c.beneficiary_level, c.beneficiary_reference
                    ),
                ),
            );
            continue;
        };
        let weights: Vec<Money> = members.iter().map(|&i| exposures[i].ead_pre_crm).collect();
        let Some(value) = resolve_value(c, &weights, warnings) else {
            continue;
        };
        if value.is_zero() {
            continue;
        }

        if c.beneficiary_level == BeneficiaryLevel::Exposure {
            shares[members[0]].push((c, value));
            continue;
        }
        let Some(split) = allocate_pro_rata(value, &weights) else {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::ZeroPoolTotal,
                    format!(
                        "Collateral {}: {} {} has zero EAD; nothing allocated",
                        c.collateral_reference, c.beneficiary_level, c.beneficiary_reference
                    ),
                ),
            );
            continue;
        };
        let total: Money = split.iter().copied().sum();
        if total != value {
            return Err(CrmError::InvariantViolation(format!(
                "collateral {} allocated {total} of {value}",
                c.collateral_reference
            )));
        }
        for (&i, share) in members.iter().zip(split) {
            if !share.is_zero() {
                shares[i].push((c, share));
            }
        }
    }
    Ok(shares)
}

/// Absolute value of a collateral item, `None` when it cannot be valued.
fn resolve_value(c: &Collateral, weights: &[Money], warnings: &mut Vec<CrmWarning>) -> Option<Money> {
    match (c.market_value, c.pledge_percentage) {
        (Some(mv), _) if mv < Decimal::ZERO => {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::NegativeAmount,
                    format!("Collateral {} has negative market value {mv}; ignored", c.collateral_reference),
                ),
            );
            None
        }
        (Some(mv), _) => Some(mv),
        (None, Some(pct)) => {
            let pool: Money = weights.iter().copied().sum();
            let clamped = pct.clamp(Decimal::ZERO, Decimal::ONE);
            if clamped != pct {
                record_warning(
                    warnings,
                    CrmWarning::batch(
                        WarningCode::CoverageOutOfRange,
                        format!(
                            "Collateral {} pledge percentage {pct} outside [0, 1]; clamped",
                            c.collateral_reference
                        ),
                    ),
                );
            }
            Some(clamped * pool)
        }
        (None, None) => {
            record_warning(
                warnings,
                CrmWarning::batch(
                    WarningCode::MissingCollateralValue,
                    format!(
                        "Collateral {} has neither market value nor pledge percentage",
                        c.collateral_reference
                    ),
                ),
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Comprehensive method
// ---------------------------------------------------------------------------

fn apply_comprehensive(
    e: &AdjustedExposure,
    items: &[(&Collateral, Money)],
    config: &CrmConfig,
) -> AdjustedExposure {
    let exp = &e.exposure;
    let mut out = e.clone();
    let ead = e.ead_pre_crm;
    let nets_ead = exp.approach == Approach::Standardised;

    let mut allocations: Vec<(CollateralCategory, CollateralAllocation)> = items
        .iter()
        .map(|(c, share)| {
            let allocation = value_share(c, *share, e, config, &mut out.warnings);
            (c.collateral_type.category(), allocation)
        })
        .collect();
    // Stable: reference order is kept within a category.
    allocations.sort_by_key(|(category, _)| *category);

    let exposure_haircut = if !nets_ead {
        Decimal::ZERO
    } else if exp.exposure_haircut < Decimal::ZERO || exp.exposure_haircut > Decimal::ONE {
        record_warning(
            &mut out.warnings,
            CrmWarning::exposure(
                WarningCode::HaircutOutOfRange,
                &exp.exposure_reference,
                format!("Exposure haircut {} outside [0, 1]; ignored", exp.exposure_haircut),
            ),
        );
        Decimal::ZERO
    } else {
        exp.exposure_haircut
    };

    let mut remaining = ead * (Decimal::ONE + exposure_haircut);
    let (mut financial, mut real_estate, mut other) = (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
    for (category, allocation) in allocations.iter_mut() {
        if !allocation.eligible {
            continue;
        }
        let applied = allocation.effectively_secured.min(remaining);
        remaining -= applied;
        allocation.amount_applied = applied;
        match category {
            CollateralCategory::Financial => financial += applied,
            CollateralCategory::RealEstate => real_estate += applied,
            CollateralCategory::OtherNonFinancial => other += applied,
        }
    }

    out.collateral_allocations = allocations.into_iter().map(|(_, a)| a).collect();
    out.collateral_financial = financial;
    out.collateral_real_estate = real_estate;
    out.collateral_other = other;
    out.collateral_value_effective = financial + real_estate + other;
    out.collateral_secured_portion = Decimal::ZERO;
    out.collateral_risk_weight = None;

    if exp.approach.is_irb() {
        let lgd = obligor_lgd(exp, config, &mut out.warnings);
        out.lgd_pre_crm = Some(lgd);
        out.lgd_post_crm = Some(match exp.approach {
            Approach::FoundationIrb => {
                foundation_lgd(ead, lgd, &out.collateral_allocations, config.framework)
            }
            _ => lgd,
        });
    }

    // Internally rated and slotting exposures keep their EAD; collateral
    // acts through LGD or the slotting category instead.
    out.net_exposure_after_collateral = if nets_ead {
        remaining.max(Decimal::ZERO)
    } else {
        ead
    };
    out.unguaranteed_portion = out.net_exposure_after_collateral;
    out.ead_unguaranteed = out.net_exposure_after_collateral;
    out
}

/// Pre-CRM LGD: modelled for A-IRB, supervisory otherwise.
pub(super) fn obligor_lgd(exp: &Exposure, config: &CrmConfig, warnings: &mut Vec<CrmWarning>) -> Rate {
    let supervisory = supervisory_lgd(exp.seniority, config.framework);
    if exp.approach != Approach::AdvancedIrb {
        return supervisory;
    }
    match exp.modelled_lgd {
        Some(lgd) if lgd >= Decimal::ZERO && lgd <= Decimal::ONE => lgd,
        other => {
            let detail = match other {
                Some(lgd) => format!("Modelled LGD {lgd} outside [0, 1]"),
                None => "No modelled LGD".to_string(),
            };
            record_warning(
                warnings,
                CrmWarning::exposure(
                    WarningCode::MissingLossGivenDefault,
                    &exp.exposure_reference,
                    format!("{detail}; supervisory {supervisory} used"),
                ),
            );
            supervisory
        }
    }
}

/// EAD-weighted blend of the supervisory LGDs of the secured parts and the
/// unsecured LGD of the remainder.
fn foundation_lgd(
    ead: Money,
    unsecured_lgd: Rate,
    allocations: &[CollateralAllocation],
    framework: RegulatoryFramework,
) -> Rate {
    if ead <= Decimal::ZERO {
        return unsecured_lgd;
    }
    let secured: Money = allocations.iter().map(|a| a.amount_applied).sum();
    let weighted: Money = allocations
        .iter()
        .map(|a| a.amount_applied * collateral_lgd(a.collateral_type, framework))
        .sum();
    let unsecured = (ead - secured).max(Decimal::ZERO);
    (weighted + unsecured * unsecured_lgd) / ead
}

/// Haircut, overcollateralise and coverage-test one share against its exposure.
fn value_share(
    c: &Collateral,
    share: Money,
    e: &AdjustedExposure,
    config: &CrmConfig,
    warnings: &mut Vec<CrmWarning>,
) -> CollateralAllocation {
    let exp = &e.exposure;
    let table = supervisory_haircut(
        c.collateral_type,
        c.issuer_credit_quality_step,
        c.residual_maturity_years,
        c.is_main_index,
        config.framework,
    );
    let haircut = match c.own_haircut {
        Some(h) if h >= Decimal::ZERO && h <= Decimal::ONE => h,
        Some(h) => {
            record_warning(
                warnings,
                CrmWarning::exposure(
                    WarningCode::HaircutOutOfRange,
                    &exp.exposure_reference,
                    format!(
                        "Collateral {} own haircut {h} outside [0, 1]; supervisory {table} used",
                        c.collateral_reference
                    ),
                ),
            );
            table
        }
        None => table,
    };
    let fx_haircut = if c.currency != exp.currency {
        config.fx_haircut
    } else {
        Decimal::ZERO
    };
    if c.collateral_type.is_debt() && c.residual_maturity_years.is_none() && c.own_haircut.is_none() {
        record_warning(
            warnings,
            CrmWarning::exposure(
                WarningCode::MissingResidualMaturity,
                &exp.exposure_reference,
                format!(
                    "Collateral {} has no residual maturity; longest band haircut {table} used",
                    c.collateral_reference
                ),
            ),
        );
    }
    let maturity_adjustment = collateral_maturity_factor(c, e, warnings);

    let adjusted_value = share
        * (Decimal::ONE - haircut)
        * (Decimal::ONE - fx_haircut)
        * maturity_adjustment;
    let ratio = overcollateralisation_ratio(c.collateral_type);
    let effectively_secured = adjusted_value / ratio;

    let mut eligible = true;
    if let Some(threshold) = minimum_coverage(c.collateral_type) {
        if e.ead_pre_crm > Decimal::ZERO && effectively_secured / e.ead_pre_crm < threshold {
            eligible = false;
            record_warning(
                warnings,
                CrmWarning::exposure(
                    WarningCode::MinimumCoverageNotMet,
                    &exp.exposure_reference,
                    format!(
                        "Collateral {} secures {} of EAD {}, below {threshold}; not recognised",
                        c.collateral_reference,
                        effectively_secured.round_dp(2),
                        e.ead_pre_crm.round_dp(2)
                    ),
                ),
            );
        }
    }

    CollateralAllocation {
        collateral_reference: c.collateral_reference.clone(),
        collateral_type: c.collateral_type,
        beneficiary_level: c.beneficiary_level,
        market_value_share: share,
        haircut,
        fx_haircut,
        maturity_adjustment,
        adjusted_value,
        overcollateralisation_ratio: ratio,
        effectively_secured,
        eligible,
        amount_applied: Decimal::ZERO,
    }
}

fn collateral_maturity_factor(
    c: &Collateral,
    e: &AdjustedExposure,
    warnings: &mut Vec<CrmWarning>,
) -> Rate {
    let Some(residual) = c.residual_maturity_years else {
        return Decimal::ONE;
    };
    let factor = maturity_mismatch_factor(residual, e.exposure.maturity_years);
    if factor < Decimal::ONE {
        record_warning(
            warnings,
            CrmWarning::exposure(
                WarningCode::CollateralMaturityMismatch,
                e.reference(),
                format!(
                    "Collateral {} matures in {residual}y against exposure {}y; factor {}",
                    c.collateral_reference,
                    e.exposure.maturity_years,
                    factor.round_dp(6)
                ),
            ),
        );
    }
    factor
}

// ---------------------------------------------------------------------------
// Simple method
// ---------------------------------------------------------------------------

fn apply_simple(e: &AdjustedExposure, items: &[(&Collateral, Money)]) -> AdjustedExposure {
    let exp = &e.exposure;
    let mut out = e.clone();
    let mut remaining = e.ead_pre_crm;
    let mut secured = Decimal::ZERO;
    let mut weighted = Decimal::ZERO;
    let mut allocations = Vec::with_capacity(items.len());

    for (c, share) in items {
        let mismatched = c
            .residual_maturity_years
            .is_some_and(|t| t < exp.maturity_years);
        let eligible = c.collateral_type.is_financial() && !mismatched;
        if !eligible {
            let reason = if mismatched {
                "maturity shorter than the exposure"
            } else {
                "non-financial collateral"
            };
            record_warning(
                &mut out.warnings,
                CrmWarning::exposure(
                    WarningCode::IneligibleUnderSimpleMethod,
                    &exp.exposure_reference,
                    format!("Collateral {} not recognised: {reason}", c.collateral_reference),
                ),
            );
        }

        let applied = if eligible { (*share).min(remaining) } else { Decimal::ZERO };
        remaining -= applied;
        secured += applied;
        weighted += applied
            * simple_method_collateral_weight(c.collateral_type, c.issuer_credit_quality_step);

        allocations.push(CollateralAllocation {
            collateral_reference: c.collateral_reference.clone(),
            collateral_type: c.collateral_type,
            beneficiary_level: c.beneficiary_level,
            market_value_share: *share,
            haircut: Decimal::ZERO,
            fx_haircut: Decimal::ZERO,
            maturity_adjustment: Decimal::ONE,
            adjusted_value: *share,
            overcollateralisation_ratio: Decimal::ONE,
            effectively_secured: *share,
            eligible,
            amount_applied: applied,
        });
    }

    out.collateral_allocations = allocations;
    out.collateral_financial = secured;
    out.collateral_real_estate = Decimal::ZERO;
    out.collateral_other = Decimal::ZERO;
    out.collateral_value_effective = secured;
    out.collateral_secured_portion = secured;
    out.collateral_risk_weight = if secured > Decimal::ZERO {
        Some(weighted / secured)
    } else {
        None
    };
    out.net_exposure_after_collateral = e.ead_pre_crm;
    out.unguaranteed_portion = e.ead_pre_crm;
    out.ead_unguaranteed = e.ead_pre_crm;
    out
}
