use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// Currency code
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    GBP,
    USD,
    EUR,
    CHF,
    JPY,
    Other(String),
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Data-quality and numeric edge-case conditions raised during a CRM run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    NegativeAmount,
    DuplicateMitigantReference,
    UnmatchedProvision,
    UnmatchedCollateral,
    UnmatchedGuarantee,
    UnknownGuarantor,
    ZeroPoolTotal,
    ProvisionExceedsExposure,
    FullyProvisioned,
    CcfOutOfRange,
    MissingModelledCcf,
    HaircutOutOfRange,
    MissingCollateralValue,
    MissingResidualMaturity,
    CoverageOutOfRange,
    CollateralMaturityMismatch,
    MinimumCoverageNotMet,
    IneligibleUnderSimpleMethod,
    GuaranteeMaturityMismatch,
    MissingGuaranteeAmount,
    NonBeneficialGuarantee,
    MissingProbabilityOfDefault,
    MissingLossGivenDefault,
}

impl WarningCode {
    /// Default severity for the condition.
    pub fn severity(&self) -> Severity {
        match self {
            WarningCode::ProvisionExceedsExposure
            | WarningCode::FullyProvisioned
            | WarningCode::CollateralMaturityMismatch
            | WarningCode::MinimumCoverageNotMet
            | WarningCode::GuaranteeMaturityMismatch
            | WarningCode::NonBeneficialGuarantee => Severity::Info,
            WarningCode::NegativeAmount | WarningCode::DuplicateMitigantReference => {
                Severity::Error
            }
            _ => Severity::Warning,
        }
    }

    /// Regulatory article the condition relates to.
    pub fn regulatory_reference(&self) -> &'static str {
        match self {
            WarningCode::NegativeAmount
            | WarningCode::DuplicateMitigantReference
            | WarningCode::UnmatchedProvision
            | WarningCode::UnmatchedCollateral
            | WarningCode::UnmatchedGuarantee
            | WarningCode::UnknownGuarantor
            | WarningCode::ZeroPoolTotal => "CRR Art. 194",
            WarningCode::ProvisionExceedsExposure | WarningCode::FullyProvisioned => {
                "CRR Art. 111(1)"
            }
            WarningCode::CcfOutOfRange | WarningCode::MissingModelledCcf => "CRR Art. 166",
            WarningCode::HaircutOutOfRange
            | WarningCode::MissingCollateralValue
            | WarningCode::MissingResidualMaturity
            | WarningCode::CoverageOutOfRange => "CRR Art. 224",
            WarningCode::CollateralMaturityMismatch | WarningCode::GuaranteeMaturityMismatch => {
                "CRR Art. 239"
            }
            WarningCode::MinimumCoverageNotMet => "CRR Art. 230",
            WarningCode::IneligibleUnderSimpleMethod => "CRR Art. 222",
            WarningCode::NonBeneficialGuarantee | WarningCode::MissingGuaranteeAmount => {
                "CRR Art. 235"
            }
            WarningCode::MissingProbabilityOfDefault | WarningCode::MissingLossGivenDefault => {
                "CRR Art. 236"
            }
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A structured warning attached to an exposure or to the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmWarning {
    pub code: WarningCode,
    pub severity: Severity,
    pub message: String,
    pub regulatory_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_reference: Option<String>,
}

impl CrmWarning {
    /// Batch-level warning, not tied to a single exposure.
    pub fn batch(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
            regulatory_reference: code.regulatory_reference().to_string(),
            exposure_reference: None,
        }
    }

    pub fn exposure(code: WarningCode, exposure_reference: &str, message: impl Into<String>) -> Self {
        Self {
            exposure_reference: Some(exposure_reference.to_string()),
            ..Self::batch(code, message)
        }
    }
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<CrmWarning>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<CrmWarning>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
