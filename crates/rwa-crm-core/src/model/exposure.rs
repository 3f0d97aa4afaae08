use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Currency, Money, Rate, Years};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Off-balance-sheet risk category driving the credit conversion factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Full,
    Medium,
    MediumLow,
    Low,
}

/// Capital calculation approach assigned by the upstream classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    Standardised,
    FoundationIrb,
    AdvancedIrb,
    Slotting,
}

impl Approach {
    /// Foundation or advanced internal ratings based.
    pub fn is_irb(&self) -> bool {
        matches!(self, Approach::FoundationIrb | Approach::AdvancedIrb)
    }

    /// Whether provisions are deducted from the exposure value (drawn first).
    pub fn deducts_provisions(&self) -> bool {
        matches!(self, Approach::Standardised)
    }
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Approach::Standardised => write!(f, "SA"),
            Approach::FoundationIrb => write!(f, "F-IRB"),
            Approach::AdvancedIrb => write!(f, "A-IRB"),
            Approach::Slotting => write!(f, "Slotting"),
        }
    }
}

/// Regulatory exposure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureClass {
    CentralGovernment,
    Institution,
    Corporate,
    CorporateSme,
    Retail,
    RetailMortgage,
    RetailQrre,
    SpecialisedLending,
    Equity,
    Other,
}

impl ExposureClass {
    pub fn is_retail(&self) -> bool {
        matches!(
            self,
            ExposureClass::Retail | ExposureClass::RetailMortgage | ExposureClass::RetailQrre
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    #[default]
    Senior,
    Subordinated,
}

// ---------------------------------------------------------------------------
// Exposure
// ---------------------------------------------------------------------------

/// A classified, rating-enriched loan or off-balance-sheet item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub exposure_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_reference: Option<String>,
    pub counterparty_reference: String,
    pub drawn_amount: Money,
    /// Undrawn commitment.
    #[serde(default)]
    pub nominal_amount: Money,
    #[serde(default)]
    pub accrued_interest: Money,
    #[serde(default)]
    pub currency: Currency,
    pub risk_category: RiskCategory,
    pub approach: Approach,
    pub exposure_class: ExposureClass,
    /// Residual effective maturity in years.
    pub maturity_years: Years,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_quality_step: Option<u8>,
    /// Obligor PD for internally rated exposures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_of_default: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modelled_ccf: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modelled_lgd: Option<Rate>,
    #[serde(default)]
    pub seniority: Seniority,
    /// Short-term self-liquidating trade letter of credit.
    #[serde(default)]
    pub is_short_term_trade_lc: bool,
    /// Volatility haircut on the exposure side (comprehensive method).
    #[serde(default)]
    pub exposure_haircut: Rate,
    /// Obligor SA risk weight supplied upstream, overrides the table lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_weight: Option<Rate>,
}

impl Exposure {
    /// A drawn-only senior SA corporate exposure with nothing else populated.
    pub fn new(exposure_reference: &str, counterparty_reference: &str) -> Self {
        Self {
            exposure_reference: exposure_reference.to_string(),
            facility_reference: None,
            counterparty_reference: counterparty_reference.to_string(),
            drawn_amount: Decimal::ZERO,
            nominal_amount: Decimal::ZERO,
            accrued_interest: Decimal::ZERO,
            currency: Currency::default(),
            risk_category: RiskCategory::Full,
            approach: Approach::Standardised,
            exposure_class: ExposureClass::Corporate,
            maturity_years: dec!(2.5),
            credit_quality_step: None,
            probability_of_default: None,
            modelled_ccf: None,
            modelled_lgd: None,
            seniority: Seniority::Senior,
            is_short_term_trade_lc: false,
            exposure_haircut: Decimal::ZERO,
            risk_weight: None,
        }
    }

    /// On-balance-sheet amount before provisions: positive drawn plus interest.
    pub fn on_balance_amount(&self) -> Money {
        self.drawn_amount.max(Decimal::ZERO) + self.accrued_interest.max(Decimal::ZERO)
    }

    /// Gross exposure before provisions and CCF, used to weight pooled provisions.
    pub fn gross_amount(&self) -> Money {
        self.on_balance_amount() + self.nominal_amount.max(Decimal::ZERO)
    }
}
