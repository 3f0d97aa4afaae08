//! Pre-mitigation exposure at default.

use rust_decimal::Decimal;

use super::{record_warning, EadInitializer, StageOutput};
use crate::config::CrmConfig;
use crate::model::AdjustedExposure;
use crate::parallel::parallel_map;
use crate::types::{CrmWarning, WarningCode};
use crate::CrmResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEadInitializer;

impl EadInitializer for StandardEadInitializer {
    fn initialize(
        &self,
        exposures: &[AdjustedExposure],
        config: &CrmConfig,
    ) -> CrmResult<StageOutput> {
        let exposures = parallel_map(exposures, config.parallel_threshold, initialize_ead);
        Ok(StageOutput {
            exposures,
            warnings: Vec::new(),
        })
    }
}

/// `ead_pre_crm = (drawn - provision_on_drawn) + interest + ead_from_ccf`.
///
/// Until mitigation runs the whole EAD is net and unguaranteed.
fn initialize_ead(e: &AdjustedExposure) -> AdjustedExposure {
    let exp = &e.exposure;
    let mut out = e.clone();
    let on_balance = exp.drawn_amount.max(Decimal::ZERO) - e.provision_on_drawn;
    let ead = on_balance + exp.accrued_interest.max(Decimal::ZERO) + e.ead_from_ccf;

    if ead <= Decimal::ZERO {
        out.ead_pre_crm = Decimal::ZERO;
        out.fully_provisioned = true;
        record_warning(
            &mut out.warnings,
            CrmWarning::exposure(
                WarningCode::FullyProvisioned,
                &exp.exposure_reference,
                "EAD is zero after provisions; excluded from risk weighting",
            ),
        );
    } else {
        out.ead_pre_crm = ead;
        out.fully_provisioned = false;
    }

    out.net_exposure_after_collateral = out.ead_pre_crm;
    out.unguaranteed_portion = out.ead_pre_crm;
    out.ead_unguaranteed = out.ead_pre_crm;
    out
}
