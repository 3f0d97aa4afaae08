//! Credit conversion of the undrawn commitment.

use rust_decimal::Decimal;

use super::{record_warning, CcfApplicator, StageOutput};
use crate::config::CrmConfig;
use crate::model::{AdjustedExposure, Approach, Exposure};
use crate::parallel::parallel_map;
use crate::tables::ccf::{modelled_ccf_floor, supervisory_ccf};
use crate::types::{CrmWarning, Rate, WarningCode};
use crate::CrmResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCcfApplicator;

impl CcfApplicator for StandardCcfApplicator {
    fn apply(&self, exposures: &[AdjustedExposure], config: &CrmConfig) -> CrmResult<StageOutput> {
        let exposures = parallel_map(exposures, config.parallel_threshold, |e| apply_ccf(e, config));
        Ok(StageOutput {
            exposures,
            warnings: Vec::new(),
        })
    }
}

fn apply_ccf(e: &AdjustedExposure, config: &CrmConfig) -> AdjustedExposure {
    let mut out = e.clone();
    let ccf = if e.exposure.nominal_amount <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        resolve_ccf(&e.exposure, config, &mut out.warnings)
    };
    out.ccf_original = ccf;
    out.ccf_guaranteed = ccf;
    out.ccf_unguaranteed = ccf;
    out.ead_from_ccf = out.nominal_after_provision * ccf;
    out
}

/// CCF for the exposure's approach; A-IRB uses the modelled value.
pub(crate) fn resolve_ccf(exp: &Exposure, config: &CrmConfig, warnings: &mut Vec<CrmWarning>) -> Rate {
    let supervisory = supervisory_ccf(
        exp.risk_category,
        exp.approach,
        config.framework,
        exp.is_short_term_trade_lc,
    );
    if exp.approach != Approach::AdvancedIrb {
        return supervisory;
    }

    let modelled = match exp.modelled_ccf {
        None => {
            record_warning(
                warnings,
                CrmWarning::exposure(
                    WarningCode::MissingModelledCcf,
                    &exp.exposure_reference,
                    format!("No modelled CCF; standardised {supervisory} used"),
                ),
            );
            return supervisory;
        }
        Some(c) if c < Decimal::ZERO || c > Decimal::ONE => {
            let clamped = c.clamp(Decimal::ZERO, Decimal::ONE);
            record_warning(
                warnings,
                CrmWarning::exposure(
                    WarningCode::CcfOutOfRange,
                    &exp.exposure_reference,
                    format!("Modelled CCF {c} outside [0, 1]; clamped to {clamped}"),
                ),
            );
            clamped
        }
        Some(c) => c,
    };
    modelled.max(modelled_ccf_floor(exp.risk_category, config.framework))
}
