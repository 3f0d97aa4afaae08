//! Standardised risk weights and F-IRB supervisory LGDs used by the
//! collateral, substitution and simple-method steps.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::RegulatoryFramework;
use crate::model::{CollateralType, ExposureClass, GuarantorEntityType, Seniority};
use crate::types::Rate;

const SOVEREIGN_RW: [Decimal; 6] = [dec!(0), dec!(0.20), dec!(0.50), dec!(1.00), dec!(1.00), dec!(1.50)];
const INSTITUTION_RW: [Decimal; 6] =
    [dec!(0.20), dec!(0.50), dec!(0.50), dec!(1.00), dec!(1.00), dec!(1.50)];
const CORPORATE_RW: [Decimal; 6] =
    [dec!(0.20), dec!(0.50), dec!(1.00), dec!(1.00), dec!(1.50), dec!(1.50)];

fn by_cqs(row: &[Decimal; 6], cqs: Option<u8>) -> Option<Rate> {
    let step = cqs?;
    if (1..=6).contains(&step) {
        Some(row[usize::from(step) - 1])
    } else {
        None
    }
}

/// SA risk weight of a protection provider by entity type and CQS.
pub fn guarantor_risk_weight(
    entity_type: GuarantorEntityType,
    cqs: Option<u8>,
    uk_institution_deviation: bool,
) -> Rate {
    match entity_type {
        GuarantorEntityType::Sovereign => by_cqs(&SOVEREIGN_RW, cqs).unwrap_or(dec!(1.00)),
        GuarantorEntityType::Institution => {
            if uk_institution_deviation && cqs == Some(2) {
                dec!(0.30)
            } else {
                by_cqs(&INSTITUTION_RW, cqs).unwrap_or(dec!(0.40))
            }
        }
        GuarantorEntityType::Corporate => by_cqs(&CORPORATE_RW, cqs).unwrap_or(dec!(1.00)),
        GuarantorEntityType::Retail => dec!(0.75),
        GuarantorEntityType::Other => dec!(1.00),
    }
}

/// SA risk weight of the obligor when no override is supplied upstream.
pub fn obligor_risk_weight(class: ExposureClass, cqs: Option<u8>, uk_deviation: bool) -> Rate {
    match class {
        ExposureClass::CentralGovernment => {
            guarantor_risk_weight(GuarantorEntityType::Sovereign, cqs, uk_deviation)
        }
        ExposureClass::Institution => {
            guarantor_risk_weight(GuarantorEntityType::Institution, cqs, uk_deviation)
        }
        ExposureClass::Corporate | ExposureClass::CorporateSme | ExposureClass::SpecialisedLending => {
            guarantor_risk_weight(GuarantorEntityType::Corporate, cqs, uk_deviation)
        }
        ExposureClass::Retail | ExposureClass::RetailQrre => dec!(0.75),
        ExposureClass::RetailMortgage => dec!(0.35),
        ExposureClass::Equity | ExposureClass::Other => dec!(1.00),
    }
}

/// F-IRB supervisory LGD for unsecured exposures.
pub fn supervisory_lgd(seniority: Seniority, framework: RegulatoryFramework) -> Rate {
    match (seniority, framework) {
        (Seniority::Subordinated, _) => dec!(0.75),
        (Seniority::Senior, RegulatoryFramework::Crr) => dec!(0.45),
        (Seniority::Senior, RegulatoryFramework::Basel31) => dec!(0.40),
    }
}

/// F-IRB supervisory LGD for the part of an exposure secured by collateral.
pub fn collateral_lgd(collateral_type: CollateralType, framework: RegulatoryFramework) -> Rate {
    match (collateral_type, framework) {
        (CollateralType::Receivable | CollateralType::RealEstate, RegulatoryFramework::Crr) => {
            dec!(0.35)
        }
        (CollateralType::Receivable | CollateralType::RealEstate, RegulatoryFramework::Basel31) => {
            dec!(0.20)
        }
        (CollateralType::OtherPhysical, RegulatoryFramework::Crr) => dec!(0.40),
        (CollateralType::OtherPhysical, RegulatoryFramework::Basel31) => dec!(0.25),
        _ => Decimal::ZERO,
    }
}

/// Floor on the collateral risk weight under the simple method.
pub const SIMPLE_METHOD_FLOOR: Decimal = dec!(0.20);

/// Risk weight of a collateral item under the simple method.
///
/// Cash and 0%-weighted sovereign debt may take 0%; everything else is
/// floored at 20%.
pub fn simple_method_collateral_weight(collateral_type: CollateralType, issuer_cqs: Option<u8>) -> Rate {
    let raw = match collateral_type {
        CollateralType::Cash => return Decimal::ZERO,
        CollateralType::SovereignBond => {
            let rw = guarantor_risk_weight(GuarantorEntityType::Sovereign, issuer_cqs, false);
            if rw.is_zero() {
                return Decimal::ZERO;
            }
            rw
        }
        CollateralType::CorporateBond => {
            guarantor_risk_weight(GuarantorEntityType::Corporate, issuer_cqs, false)
        }
        CollateralType::Gold => Decimal::ZERO,
        _ => dec!(1.00),
    };
    raw.max(SIMPLE_METHOD_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarantor_weights() {
        assert_eq!(guarantor_risk_weight(GuarantorEntityType::Sovereign, Some(1), false), dec!(0));
        assert_eq!(guarantor_risk_weight(GuarantorEntityType::Sovereign, None, false), dec!(1.00));
        assert_eq!(guarantor_risk_weight(GuarantorEntityType::Institution, Some(2), false), dec!(0.50));
        assert_eq!(guarantor_risk_weight(GuarantorEntityType::Institution, Some(2), true), dec!(0.30));
        assert_eq!(guarantor_risk_weight(GuarantorEntityType::Institution, None, false), dec!(0.40));
        assert_eq!(guarantor_risk_weight(GuarantorEntityType::Corporate, Some(5), false), dec!(1.50));
        assert_eq!(guarantor_risk_weight(GuarantorEntityType::Corporate, Some(9), false), dec!(1.00));
    }

    #[test]
    fn test_obligor_defaults() {
        assert_eq!(obligor_risk_weight(ExposureClass::Corporate, None, false), dec!(1.00));
        assert_eq!(obligor_risk_weight(ExposureClass::RetailMortgage, None, false), dec!(0.35));
    }

    #[test]
    fn test_supervisory_lgd() {
        assert_eq!(supervisory_lgd(Seniority::Senior, RegulatoryFramework::Crr), dec!(0.45));
        assert_eq!(supervisory_lgd(Seniority::Senior, RegulatoryFramework::Basel31), dec!(0.40));
        assert_eq!(supervisory_lgd(Seniority::Subordinated, RegulatoryFramework::Basel31), dec!(0.75));
    }

    #[test]
    fn test_collateral_lgd_by_framework() {
        let crr = RegulatoryFramework::Crr;
        let b31 = RegulatoryFramework::Basel31;
        assert_eq!(collateral_lgd(CollateralType::Cash, crr), dec!(0));
        assert_eq!(collateral_lgd(CollateralType::CorporateBond, b31), dec!(0));
        assert_eq!(collateral_lgd(CollateralType::RealEstate, crr), dec!(0.35));
        assert_eq!(collateral_lgd(CollateralType::Receivable, b31), dec!(0.20));
        assert_eq!(collateral_lgd(CollateralType::OtherPhysical, crr), dec!(0.40));
        assert_eq!(collateral_lgd(CollateralType::OtherPhysical, b31), dec!(0.25));
    }

    #[test]
    fn test_simple_method_floor() {
        assert_eq!(simple_method_collateral_weight(CollateralType::Cash, None), dec!(0));
        assert_eq!(simple_method_collateral_weight(CollateralType::SovereignBond, Some(1)), dec!(0));
        assert_eq!(simple_method_collateral_weight(CollateralType::CorporateBond, Some(1)), dec!(0.20));
        assert_eq!(simple_method_collateral_weight(CollateralType::ListedEquity, None), dec!(1.00));
    }
}
