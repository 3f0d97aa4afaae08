//! Capital formula seam.
//!
//! The waterfall needs a risk-weight equivalent for internally rated
//! obligors and guarantors to run the beneficial-guarantee test. The
//! downstream IRB calculator owns the real formula; [`SupervisoryIrbFormula`]
//! is the supervisory ASRF formula used by default.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::config::RegulatoryFramework;
use crate::error::CrmError;
use crate::model::ExposureClass;
use crate::types::{Rate, Years};
use crate::CrmResult;

/// Risk parameters for one internally rated position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrbParameters {
    pub probability_of_default: Rate,
    pub loss_given_default: Rate,
    pub maturity_years: Years,
    pub exposure_class: ExposureClass,
}

/// Maps IRB parameters to a risk weight (RWA per unit of EAD).
pub trait CapitalFormula: Send + Sync {
    fn risk_weight(&self, params: &IrbParameters) -> CrmResult<Rate>;
}

/// Basel ASRF formula with the framework's PD floor and scaling factor.
#[derive(Debug, Clone, Copy)]
pub struct SupervisoryIrbFormula {
    pub framework: RegulatoryFramework,
}

impl SupervisoryIrbFormula {
    pub fn new(framework: RegulatoryFramework) -> Self {
        Self { framework }
    }

    fn pd_floor(&self) -> f64 {
        match self.framework {
            RegulatoryFramework::Crr => 0.0003,
            RegulatoryFramework::Basel31 => 0.0005,
        }
    }

    fn scaling_factor(&self) -> f64 {
        match self.framework {
            RegulatoryFramework::Crr => 1.06,
            RegulatoryFramework::Basel31 => 1.0,
        }
    }
}

fn to_f64(value: Decimal, field: &str) -> CrmResult<f64> {
    value.to_f64().ok_or_else(|| CrmError::Numerical(format!("{field} not representable as f64")))
}

/// Asset correlation by exposure class.
fn correlation(class: ExposureClass, pd: f64) -> f64 {
    let blend = |low: f64, high: f64, decay: f64| {
        let f = (1.0 - (-decay * pd).exp()) / (1.0 - (-decay).exp());
        low * f + high * (1.0 - f)
    };
    match class {
        ExposureClass::RetailMortgage => 0.15,
        ExposureClass::RetailQrre => 0.04,
        ExposureClass::Retail => blend(0.03, 0.16, 35.0),
        _ => blend(0.12, 0.24, 50.0),
    }
}

impl CapitalFormula for SupervisoryIrbFormula {
    fn risk_weight(&self, params: &IrbParameters) -> CrmResult<Rate> {
        let pd = to_f64(params.probability_of_default, "probability_of_default")?
            .clamp(self.pd_floor(), 0.9999);
        let lgd = to_f64(params.loss_given_default, "loss_given_default")?;
        if !(0.0..=1.0).contains(&lgd) {
            return Err(CrmError::InvalidInput {
                field: "loss_given_default".into(),
                reason: format!("must lie in [0, 1], got {lgd}"),
            });
        }
        let m = to_f64(params.maturity_years, "maturity_years")?.clamp(1.0, 5.0);

        let n = Normal::new(0.0, 1.0).map_err(|e| CrmError::Numerical(e.to_string()))?;
        let r = correlation(params.exposure_class, pd);
        let g_pd = n.inverse_cdf(pd);
        let g_999 = n.inverse_cdf(0.999);
        let conditional = n.cdf(((1.0 - r).recip()).sqrt() * g_pd + (r / (1.0 - r)).sqrt() * g_999);
        let mut k = lgd * conditional - pd * lgd;

        if !params.exposure_class.is_retail() {
            let b = (0.11852 - 0.05478 * pd.ln()).powi(2);
            k *= (1.0 + (m - 2.5) * b) / (1.0 - 1.5 * b);
        }

        let rw = (k.max(0.0) * 12.5 * self.scaling_factor()).max(0.0);
        Decimal::from_f64(rw)
            .map(|d| d.round_dp(10))
            .ok_or_else(|| CrmError::Numerical(format!("risk weight {rw} not representable")))
    }
}
