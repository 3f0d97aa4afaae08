//! Run configuration for the CRM waterfall.
//!
//! Loaded from TOML or built in code, then validated before any exposure is
//! processed. Every stage receives the same immutable value.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::CrmError;
use crate::model::{Exposure, ExposureClass};
use crate::types::Rate;
use crate::CrmResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulatoryFramework {
    #[default]
    Crr,
    #[serde(rename = "basel_3_1", alias = "basel31")]
    Basel31,
}

impl std::fmt::Display for RegulatoryFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegulatoryFramework::Crr => write!(f, "CRR"),
            RegulatoryFramework::Basel31 => write!(f, "Basel 3.1"),
        }
    }
}

/// Financial collateral method for standardised exposures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralMethod {
    #[default]
    Comprehensive,
    Simple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmConfig {
    #[serde(default)]
    pub framework: RegulatoryFramework,

    /// Date residual maturities are measured from.
    pub reporting_date: NaiveDate,

    #[serde(default)]
    pub collateral_method: CollateralMethod,

    /// Exposure classes the firm may rate internally.
    #[serde(default)]
    pub irb_permissions: BTreeSet<ExposureClass>,

    /// Currency mismatch haircut for collateral and guarantees.
    #[serde(default = "default_fx_haircut")]
    pub fx_haircut: Rate,

    /// 30% weight for CQS 2 institutions.
    #[serde(default)]
    pub uk_institution_deviation: bool,

    /// Batch size from which stages fan out over rayon.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_fx_haircut() -> Rate {
    dec!(0.08)
}

fn default_parallel_threshold() -> usize {
    256
}

impl CrmConfig {
    pub fn crr(reporting_date: NaiveDate) -> Self {
        Self {
            framework: RegulatoryFramework::Crr,
            reporting_date,
            collateral_method: CollateralMethod::default(),
            irb_permissions: BTreeSet::new(),
            fx_haircut: default_fx_haircut(),
            uk_institution_deviation: false,
            parallel_threshold: default_parallel_threshold(),
        }
    }

    pub fn basel_3_1(reporting_date: NaiveDate) -> Self {
        Self {
            framework: RegulatoryFramework::Basel31,
            ..Self::crr(reporting_date)
        }
    }

    /// Grant IRB permission for the given classes.
    pub fn with_irb_permissions(mut self, classes: &[ExposureClass]) -> Self {
        self.irb_permissions.extend(classes.iter().copied());
        self
    }

    pub fn from_toml_str(content: &str) -> CrmResult<Self> {
        let config: CrmConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> CrmResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CrmError::InvalidConfiguration {
                field: "path".into(),
                reason: format!("{}: {e}", path.display()),
            })?;
        Self::from_toml_str(&content)
    }

    pub fn is_basel_3_1(&self) -> bool {
        self.framework == RegulatoryFramework::Basel31
    }

    pub fn has_irb_permission(&self, class: ExposureClass) -> bool {
        self.irb_permissions.contains(&class)
    }

    /// Validate the configuration
    pub fn validate(&self) -> CrmResult<()> {
        if self.fx_haircut < Decimal::ZERO || self.fx_haircut >= Decimal::ONE {
            return Err(CrmError::InvalidConfiguration {
                field: "fx_haircut".into(),
                reason: format!("must lie in [0, 1), got {}", self.fx_haircut),
            });
        }
        if self.parallel_threshold == 0 {
            return Err(CrmError::InvalidConfiguration {
                field: "parallel_threshold".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Check the batch is consistent with the configured permissions.
    ///
    /// An internally rated exposure in a class without IRB permission means
    /// the classifier and this run disagree on the firm's approvals.
    pub fn validate_against(&self, exposures: &[Exposure]) -> CrmResult<()> {
        if let Some(e) = exposures
            .iter()
            .find(|e| e.approach.is_irb() && !self.has_irb_permission(e.exposure_class))
        {
            return Err(CrmError::InvalidConfiguration {
                field: "irb_permissions".into(),
                reason: format!(
                    "exposure {} is {} but {:?} has no IRB permission",
                    e.exposure_reference, e.approach, e.exposure_class
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Approach;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let cfg = CrmConfig::from_toml_str(r#"reporting_date = "2026-12-31""#).unwrap();
        assert_eq!(cfg.framework, RegulatoryFramework::Crr);
        assert_eq!(cfg.collateral_method, CollateralMethod::Comprehensive);
        assert_eq!(cfg.fx_haircut, dec!(0.08));
        assert!(!cfg.uk_institution_deviation);
        assert!(cfg.irb_permissions.is_empty());
    }

    #[test]
    fn test_full_toml() {
        let cfg = CrmConfig::from_toml_str(
            r#"
            framework = "basel_3_1"
            reporting_date = "2027-01-01"
            collateral_method = "simple"
            irb_permissions = ["corporate", "institution"]
            fx_haircut = "0.10"
            uk_institution_deviation = true
            parallel_threshold = 8
            "#,
        )
        .unwrap();
        assert!(cfg.is_basel_3_1());
        assert_eq!(cfg.collateral_method, CollateralMethod::Simple);
        assert!(cfg.has_irb_permission(ExposureClass::Corporate));
        assert!(!cfg.has_irb_permission(ExposureClass::Retail));
        assert_eq!(cfg.fx_haircut, dec!(0.10));
        assert_eq!(cfg.parallel_threshold, 8);
    }

    #[test]
    fn test_serialized_config_has_only_read_fields() {
        let json = serde_json::to_value(CrmConfig::crr(date())).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "collateral_method",
                "framework",
                "fx_haircut",
                "irb_permissions",
                "parallel_threshold",
                "reporting_date",
                "uk_institution_deviation",
            ]
        );
    }

    #[test]
    fn test_missing_reporting_date_is_fatal() {
        let err = CrmConfig::from_toml_str(r#"framework = "crr""#).unwrap_err();
        assert!(matches!(err, CrmError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_fx_haircut_out_of_range() {
        let mut cfg = CrmConfig::crr(date());
        cfg.fx_haircut = dec!(1.2);
        match cfg.validate() {
            Err(CrmError::InvalidConfiguration { field, .. }) => assert_eq!(field, "fx_haircut"),
            other => panic!("Expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_irb_exposure_without_permission() {
        let cfg = CrmConfig::crr(date());
        let mut exp = Exposure::new("E1", "C1");
        exp.approach = Approach::FoundationIrb;
        assert!(cfg.validate_against(&[exp.clone()]).is_err());

        let cfg = cfg.with_irb_permissions(&[ExposureClass::Corporate]);
        assert!(cfg.validate_against(&[exp]).is_ok());
    }
}
