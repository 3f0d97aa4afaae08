use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::exposure::{Approach, Exposure};
use super::mitigants::{BeneficiaryLevel, CollateralType};
use crate::types::{CrmWarning, Money, Rate, Years};

// ---------------------------------------------------------------------------
// Guarantee outcome types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuarantorTreatment {
    #[default]
    None,
    Standardised,
    InternallyRated,
}

/// Inputs the capital formula receives for the part of the exposure covered
/// by one internally rated guarantor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSubstitution {
    pub guarantee_reference: String,
    pub guarantor_reference: String,
    pub probability_of_default: Rate,
    pub loss_given_default: Rate,
    pub maturity_years: Years,
    pub amount_applied: Money,
}

/// One guarantee's contribution to an exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuaranteeApplication {
    pub guarantee_reference: String,
    pub guarantor_reference: String,
    pub treatment: GuarantorTreatment,
    /// SA weight, or the risk-weight equivalent of an internally rated guarantor.
    pub risk_weight: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability_of_default: Option<Rate>,
    /// Protection allocated to this exposure before adjustments.
    pub covered_amount: Money,
    pub maturity_adjustment: Rate,
    pub fx_haircut: Rate,
    pub amount_applied: Money,
}

/// One collateral item's share on an exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralAllocation {
    pub collateral_reference: String,
    pub collateral_type: CollateralType,
    pub beneficiary_level: BeneficiaryLevel,
    pub market_value_share: Money,
    pub haircut: Rate,
    pub fx_haircut: Rate,
    pub maturity_adjustment: Rate,
    pub adjusted_value: Money,
    pub overcollateralisation_ratio: Decimal,
    pub effectively_secured: Money,
    /// False when the share failed minimum coverage or method eligibility.
    pub eligible: bool,
    /// Amount of exposure actually covered after priority consumption.
    pub amount_applied: Money,
}

// ---------------------------------------------------------------------------
// Adjusted exposure
// ---------------------------------------------------------------------------

/// An exposure with every CRM adjustment recorded next to the original fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedExposure {
    #[serde(flatten)]
    pub exposure: Exposure,

    pub provision_allocated: Money,
    pub provision_on_drawn: Money,
    pub provision_on_nominal: Money,
    pub provision_deducted: Money,
    pub nominal_after_provision: Money,

    pub ccf_original: Rate,
    pub ccf_guaranteed: Rate,
    pub ccf_unguaranteed: Rate,
    pub ead_from_ccf: Money,

    pub ead_pre_crm: Money,
    pub fully_provisioned: bool,

    pub collateral_allocations: Vec<CollateralAllocation>,
    pub collateral_value_effective: Money,
    pub collateral_financial: Money,
    pub collateral_real_estate: Money,
    pub collateral_other: Money,
    /// Simple method only: portion weighted at the collateral risk weight.
    pub collateral_secured_portion: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collateral_risk_weight: Option<Rate>,
    pub net_exposure_after_collateral: Money,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lgd_pre_crm: Option<Rate>,
    /// IRB only. F-IRB blends supervisory LGDs over the secured and
    /// unsecured parts; A-IRB keeps its own estimate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lgd_post_crm: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obligor_risk_weight: Option<Rate>,
    pub guarantee_applications: Vec<GuaranteeApplication>,
    pub guaranteed_portion: Money,
    pub unguaranteed_portion: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guarantor_reference: Option<String>,
    pub guarantor_treatment: GuarantorTreatment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guarantor_risk_weight_or_pd: Option<Rate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameter_substitutions: Vec<ParameterSubstitution>,
    /// EAD of the guaranteed portion after any cross-approach CCF restatement.
    pub ead_guaranteed: Money,
    pub ead_unguaranteed: Money,

    pub ead_post_crm: Money,
    pub warnings: Vec<CrmWarning>,
}

impl AdjustedExposure {
    /// Starting record before any stage has run.
    pub fn from_exposure(exposure: Exposure) -> Self {
        let nominal = exposure.nominal_amount.max(Decimal::ZERO);
        Self {
            exposure,
            provision_allocated: Decimal::ZERO,
            provision_on_drawn: Decimal::ZERO,
            provision_on_nominal: Decimal::ZERO,
            provision_deducted: Decimal::ZERO,
            nominal_after_provision: nominal,
            ccf_original: Decimal::ZERO,
            ccf_guaranteed: Decimal::ZERO,
            ccf_unguaranteed: Decimal::ZERO,
            ead_from_ccf: Decimal::ZERO,
            ead_pre_crm: Decimal::ZERO,
            fully_provisioned: false,
            collateral_allocations: Vec::new(),
            collateral_value_effective: Decimal::ZERO,
            collateral_financial: Decimal::ZERO,
            collateral_real_estate: Decimal::ZERO,
            collateral_other: Decimal::ZERO,
            collateral_secured_portion: Decimal::ZERO,
            collateral_risk_weight: None,
            net_exposure_after_collateral: Decimal::ZERO,
            lgd_pre_crm: None,
            lgd_post_crm: None,
            obligor_risk_weight: None,
            guarantee_applications: Vec::new(),
            guaranteed_portion: Decimal::ZERO,
            unguaranteed_portion: Decimal::ZERO,
            guarantor_reference: None,
            guarantor_treatment: GuarantorTreatment::None,
            guarantor_risk_weight_or_pd: None,
            parameter_substitutions: Vec::new(),
            ead_guaranteed: Decimal::ZERO,
            ead_unguaranteed: Decimal::ZERO,
            ead_post_crm: Decimal::ZERO,
            warnings: Vec::new(),
        }
    }

    pub fn reference(&self) -> &str {
        &self.exposure.exposure_reference
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// RWA under risk-weight substitution for non-IRB exposures.
    ///
    /// Guaranteed amounts carry the guarantor's weight, the simple-method
    /// secured portion the collateral weight, and the rest the obligor's.
    /// Internally rated exposures return `None`; their capital comes from the
    /// IRB formula downstream.
    pub fn substitution_rwa(&self) -> Option<Money> {
        if self.exposure.approach.is_irb() {
            return None;
        }
        let obligor_rw = self.obligor_risk_weight?;
        let guaranteed: Money = self
            .guarantee_applications
            .iter()
            .map(|g| g.amount_applied * g.risk_weight)
            .sum();
        let secured = self.collateral_secured_portion
            * self.collateral_risk_weight.unwrap_or(Decimal::ZERO);
        let residual = (self.unguaranteed_portion - self.collateral_secured_portion)
            .max(Decimal::ZERO);
        Some(guaranteed + secured + residual * obligor_rw)
    }

    /// Audit trail of the EAD waterfall.
    pub fn crm_calculation(&self) -> String {
        format!(
            "EAD: gross={}; coll={}; guar={}; prov={}; final={}",
            self.ead_pre_crm.round_dp(2),
            self.collateral_value_effective.round_dp(2),
            self.guaranteed_portion.round_dp(2),
            self.provision_deducted.round_dp(2),
            self.ead_post_crm.round_dp(2),
        )
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Clean,
    ProcessedWithWarnings,
}

/// Output of a CRM run, ordered by exposure reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmAdjustedBundle {
    pub exposures: Vec<AdjustedExposure>,
    pub status: RunStatus,
}

impl CrmAdjustedBundle {
    pub fn get(&self, exposure_reference: &str) -> Option<&AdjustedExposure> {
        self.exposures
            .binary_search_by(|e| e.reference().cmp(exposure_reference))
            .ok()
            .map(|idx| &self.exposures[idx])
    }

    pub fn standardised(&self) -> Vec<&AdjustedExposure> {
        self.by_approach(|a| a == Approach::Standardised)
    }

    pub fn irb(&self) -> Vec<&AdjustedExposure> {
        self.by_approach(|a| a.is_irb())
    }

    pub fn slotting(&self) -> Vec<&AdjustedExposure> {
        self.by_approach(|a| a == Approach::Slotting)
    }

    /// Original classified exposures, for re-running the waterfall.
    pub fn into_classified(self) -> Vec<Exposure> {
        self.exposures.into_iter().map(|e| e.exposure).collect()
    }

    fn by_approach(&self, pred: impl Fn(Approach) -> bool) -> Vec<&AdjustedExposure> {
        self.exposures
            .iter()
            .filter(|e| pred(e.exposure.approach))
            .collect()
    }
}
