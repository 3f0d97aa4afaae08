use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::exposure::ExposureClass;
use crate::types::{Currency, Money, Rate, Years};

/// Level at which a mitigant is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeneficiaryLevel {
    Exposure,
    Facility,
    Counterparty,
}

impl std::fmt::Display for BeneficiaryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BeneficiaryLevel::Exposure => write!(f, "exposure"),
            BeneficiaryLevel::Facility => write!(f, "facility"),
            BeneficiaryLevel::Counterparty => write!(f, "counterparty"),
        }
    }
}

// ---------------------------------------------------------------------------
// Provisions
// ---------------------------------------------------------------------------

/// Specific credit risk adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provision {
    pub provision_reference: String,
    pub beneficiary_level: BeneficiaryLevel,
    pub beneficiary_reference: String,
    pub amount: Money,
}

// ---------------------------------------------------------------------------
// Collateral
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralType {
    Cash,
    SovereignBond,
    CorporateBond,
    ListedEquity,
    OtherEquity,
    Gold,
    RealEstate,
    Receivable,
    OtherPhysical,
}

/// Priority bucket in which collateral consumes the exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralCategory {
    Financial,
    RealEstate,
    OtherNonFinancial,
}

impl CollateralType {
    pub fn category(&self) -> CollateralCategory {
        match self {
            CollateralType::RealEstate => CollateralCategory::RealEstate,
            CollateralType::Receivable | CollateralType::OtherPhysical => {
                CollateralCategory::OtherNonFinancial
            }
            _ => CollateralCategory::Financial,
        }
    }

    pub fn is_financial(&self) -> bool {
        self.category() == CollateralCategory::Financial
    }

    /// Debt securities, whose haircut depends on residual maturity.
    pub fn is_debt(&self) -> bool {
        matches!(self, CollateralType::SovereignBond | CollateralType::CorporateBond)
    }

    /// Subject to the 30% minimum coverage cliff.
    pub fn has_minimum_coverage(&self) -> bool {
        matches!(self, CollateralType::RealEstate | CollateralType::OtherPhysical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Residential,
    Commercial,
}

/// Funded credit protection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collateral {
    pub collateral_reference: String,
    pub beneficiary_level: BeneficiaryLevel,
    pub beneficiary_reference: String,
    pub collateral_type: CollateralType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_value: Option<Money>,
    /// Fraction of the level's pre-CRM EAD pledged, used when no market value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pledge_percentage: Option<Rate>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_credit_quality_step: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_maturity_years: Option<Years>,
    #[serde(default)]
    pub is_main_index: bool,
    /// Own-estimate volatility haircut, replaces the supervisory table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_haircut: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_to_value: Option<Rate>,
    #[serde(default)]
    pub income_producing: bool,
}

impl Collateral {
    /// Collateral with a market value and every optional attribute unset.
    pub fn new(
        collateral_reference: &str,
        beneficiary_level: BeneficiaryLevel,
        beneficiary_reference: &str,
        collateral_type: CollateralType,
        market_value: Money,
    ) -> Self {
        Self {
            collateral_reference: collateral_reference.to_string(),
            beneficiary_level,
            beneficiary_reference: beneficiary_reference.to_string(),
            collateral_type,
            market_value: Some(market_value),
            pledge_percentage: None,
            currency: Currency::default(),
            issuer_credit_quality_step: None,
            residual_maturity_years: None,
            is_main_index: false,
            own_haircut: None,
            property_type: None,
            loan_to_value: None,
            income_producing: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Guarantees
// ---------------------------------------------------------------------------

/// Unfunded credit protection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guarantee {
    pub guarantee_reference: String,
    pub beneficiary_level: BeneficiaryLevel,
    pub protected_reference: String,
    pub guarantor_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covered_amount: Option<Money>,
    /// Fraction of the protected EAD covered, used when no amount is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_covered: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuarantorEntityType {
    Sovereign,
    Institution,
    Corporate,
    Retail,
    Other,
}

/// Rating information about a protection provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuarantorProfile {
    pub counterparty_reference: String,
    pub entity_type: GuarantorEntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_quality_step: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_pd: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_class: Option<ExposureClass>,
}

impl GuarantorProfile {
    /// Exposure class the firm would hold against the guarantor directly.
    pub fn exposure_class(&self) -> ExposureClass {
        self.exposure_class.unwrap_or(match self.entity_type {
            GuarantorEntityType::Sovereign => ExposureClass::CentralGovernment,
            GuarantorEntityType::Institution => ExposureClass::Institution,
            GuarantorEntityType::Corporate => ExposureClass::Corporate,
            GuarantorEntityType::Retail => ExposureClass::Retail,
            GuarantorEntityType::Other => ExposureClass::Other,
        })
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Raw mitigant tables supplied alongside the exposures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MitigantTables {
    #[serde(default)]
    pub provisions: Vec<Provision>,
    #[serde(default)]
    pub collateral: Vec<Collateral>,
    #[serde(default)]
    pub guarantees: Vec<Guarantee>,
    #[serde(default)]
    pub guarantors: Vec<GuarantorProfile>,
}
