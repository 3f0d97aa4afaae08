//! Final EAD, invariant checks and run status.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::CrmError;
use crate::model::{AdjustedExposure, CrmAdjustedBundle, RunStatus};
use crate::types::{CrmWarning, Money};
use crate::CrmResult;

/// Absolute slack allowed when comparing derived amounts.
const TOLERANCE: Money = dec!(0.000001);

/// Close the batch: set `ead_post_crm`, check the accounting identities and
/// gather every warning, batch-level first.
pub fn finalize(
    mut exposures: Vec<AdjustedExposure>,
    batch_warnings: Vec<CrmWarning>,
) -> CrmResult<(CrmAdjustedBundle, Vec<CrmWarning>)> {
    for e in &mut exposures {
        e.ead_post_crm = e.ead_guaranteed + e.ead_unguaranteed;
        check_invariants(e)?;
    }

    let mut warnings = batch_warnings;
    warnings.extend(exposures.iter().flat_map(|e| e.warnings.iter().cloned()));
    let status = if warnings.is_empty() {
        RunStatus::Clean
    } else {
        RunStatus::ProcessedWithWarnings
    };

    Ok((CrmAdjustedBundle { exposures, status }, warnings))
}

fn check_invariants(e: &AdjustedExposure) -> CrmResult<()> {
    let exp = &e.exposure;
    let reference = exp.exposure_reference.as_str();

    if exp.approach.deducts_provisions() {
        ensure(
            approx_eq(e.provision_on_drawn + e.provision_on_nominal, e.provision_allocated),
            reference,
            "provision split does not sum to the allocation",
        )?;
    } else {
        ensure(
            e.provision_on_drawn.is_zero() && e.provision_on_nominal.is_zero(),
            reference,
            "provision deducted on a non-standardised exposure",
        )?;
    }

    let expected_nominal =
        (exp.nominal_amount.max(Decimal::ZERO) - e.provision_on_nominal).max(Decimal::ZERO);
    ensure(
        approx_eq(e.nominal_after_provision, expected_nominal),
        reference,
        "nominal after provision inconsistent with the nominal deduction",
    )?;
    ensure(e.ead_pre_crm >= Decimal::ZERO, reference, "negative EAD before mitigation")?;
    ensure(
        e.net_exposure_after_collateral >= Decimal::ZERO,
        reference,
        "negative exposure after collateral",
    )?;
    ensure(
        approx_eq(
            e.guaranteed_portion + e.unguaranteed_portion,
            e.net_exposure_after_collateral,
        ),
        reference,
        "guaranteed and unguaranteed portions do not sum to net exposure",
    )?;
    if let Some(lgd) = e.lgd_post_crm {
        ensure(
            lgd >= Decimal::ZERO && lgd <= Decimal::ONE,
            reference,
            "LGD after collateral outside [0, 1]",
        )?;
    }
    ensure(e.ead_post_crm >= Decimal::ZERO, reference, "negative EAD after mitigation")
}

fn approx_eq(a: Money, b: Money) -> bool {
    (a - b).abs() <= TOLERANCE
}

fn ensure(condition: bool, reference: &str, message: &str) -> CrmResult<()> {
    if condition {
        Ok(())
    } else {
        Err(CrmError::InvariantViolation(format!("{reference}: {message}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Exposure;
    use crate::types::WarningCode;

    fn record(ead: Money) -> AdjustedExposure {
        let mut e = Exposure::new("E1", "C1");
        e.drawn_amount = ead;
        let mut rec = AdjustedExposure::from_exposure(e);
        rec.ead_pre_crm = ead;
        rec.net_exposure_after_collateral = ead;
        rec.unguaranteed_portion = ead;
        rec.ead_unguaranteed = ead;
        rec
    }

    #[test]
    fn test_post_crm_sums_guaranteed_and_unguaranteed() {
        let mut rec = record(dec!(1000));
        rec.guaranteed_portion = dec!(400);
        rec.unguaranteed_portion = dec!(600);
        rec.ead_guaranteed = dec!(300);
        rec.ead_unguaranteed = dec!(600);
        let (bundle, warnings) = finalize(vec![rec], Vec::new()).unwrap();
        assert_eq!(bundle.exposures[0].ead_post_crm, dec!(900));
        assert_eq!(bundle.status, RunStatus::Clean);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_portion_mismatch_is_fatal() {
        let mut rec = record(dec!(1000));
        rec.guaranteed_portion = dec!(500);
        let err = finalize(vec![rec], Vec::new()).unwrap_err();
        assert!(matches!(err, CrmError::InvariantViolation(_)));
    }

    #[test]
    fn test_lgd_out_of_range_is_fatal() {
        let mut rec = record(dec!(1000));
        rec.lgd_post_crm = Some(dec!(1.2));
        let err = finalize(vec![rec], Vec::new()).unwrap_err();
        assert!(matches!(err, CrmError::InvariantViolation(_)));
    }

    #[test]
    fn test_warnings_aggregated_batch_first() {
        let mut rec = record(dec!(10));
        rec.warnings.push(CrmWarning::exposure(WarningCode::FullyProvisioned, "E1", "x"));
        let batch = vec![CrmWarning::batch(WarningCode::UnmatchedProvision, "y")];
        let (bundle, warnings) = finalize(vec![rec], batch).unwrap();
        assert_eq!(bundle.status, RunStatus::ProcessedWithWarnings);
        let codes: Vec<WarningCode> = warnings.iter().map(|w| w.code).collect();
        assert_eq!(codes, vec![WarningCode::UnmatchedProvision, WarningCode::FullyProvisioned]);
    }
}
