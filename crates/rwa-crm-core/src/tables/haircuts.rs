//! Supervisory volatility haircuts, overcollateralisation ratios and
//! maturity mismatch factors.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::RegulatoryFramework;
use crate::model::CollateralType;
use crate::types::{Rate, Years};

/// Residual maturity band of debt collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaturityBand {
    UpToOne,
    OneToThree,
    ThreeToFive,
    OneToFive,
    FiveToTen,
    OverFive,
    OverTen,
}

impl MaturityBand {
    /// CRR uses three bands, Basel 3.1 five.
    pub fn classify(residual: Years, framework: RegulatoryFramework) -> Self {
        match framework {
            RegulatoryFramework::Crr => {
                if residual <= dec!(1) {
                    MaturityBand::UpToOne
                } else if residual <= dec!(5) {
                    MaturityBand::OneToFive
                } else {
                    MaturityBand::OverFive
                }
            }
            RegulatoryFramework::Basel31 => {
                if residual <= dec!(1) {
                    MaturityBand::UpToOne
                } else if residual <= dec!(3) {
                    MaturityBand::OneToThree
                } else if residual <= dec!(5) {
                    MaturityBand::ThreeToFive
                } else if residual <= dec!(10) {
                    MaturityBand::FiveToTen
                } else {
                    MaturityBand::OverTen
                }
            }
        }
    }

    /// Band assumed for debt collateral with no residual maturity.
    pub fn longest(framework: RegulatoryFramework) -> Self {
        match framework {
            RegulatoryFramework::Crr => MaturityBand::OverFive,
            RegulatoryFramework::Basel31 => MaturityBand::OverTen,
        }
    }

    /// Column index into the haircut rows below.
    fn column(&self) -> usize {
        match self {
            MaturityBand::UpToOne => 0,
            MaturityBand::OneToThree | MaturityBand::OneToFive => 1,
            MaturityBand::ThreeToFive | MaturityBand::OverFive => 2,
            MaturityBand::FiveToTen => 3,
            MaturityBand::OverTen => 4,
        }
    }
}

// CRR Art. 224 Table 1 (10-day liquidation period).
const CRR_SOVEREIGN_CQS1: [Decimal; 3] = [dec!(0.005), dec!(0.02), dec!(0.04)];
const CRR_SOVEREIGN_CQS2_3: [Decimal; 3] = [dec!(0.01), dec!(0.03), dec!(0.06)];
const CRR_CORPORATE_CQS1_2: [Decimal; 3] = [dec!(0.01), dec!(0.04), dec!(0.06)];
const CRR_CORPORATE_CQS3: [Decimal; 3] = [dec!(0.02), dec!(0.06), dec!(0.08)];

// Basel 3.1 CRE22.52.
const B31_SOVEREIGN_CQS1: [Decimal; 5] =
    [dec!(0.005), dec!(0.02), dec!(0.02), dec!(0.04), dec!(0.04)];
const B31_SOVEREIGN_CQS2_3: [Decimal; 5] =
    [dec!(0.01), dec!(0.03), dec!(0.04), dec!(0.06), dec!(0.12)];
const B31_CORPORATE_CQS1_2: [Decimal; 5] =
    [dec!(0.01), dec!(0.04), dec!(0.06), dec!(0.10), dec!(0.12)];
const B31_CORPORATE_CQS3: [Decimal; 5] =
    [dec!(0.02), dec!(0.06), dec!(0.08), dec!(0.15), dec!(0.15)];

const UNRATED_SOVEREIGN_HAIRCUT: Decimal = dec!(0.15);
const UNRATED_CORPORATE_HAIRCUT: Decimal = dec!(0.20);

/// Supervisory volatility haircut for a collateral item.
pub fn supervisory_haircut(
    collateral_type: CollateralType,
    issuer_cqs: Option<u8>,
    residual_maturity: Option<Years>,
    is_main_index: bool,
    framework: RegulatoryFramework,
) -> Rate {
    let band = match residual_maturity {
        Some(residual) => MaturityBand::classify(residual, framework),
        None => MaturityBand::longest(framework),
    };

    match collateral_type {
        CollateralType::Cash | CollateralType::RealEstate => Decimal::ZERO,
        CollateralType::Gold => dec!(0.15),
        CollateralType::Receivable => dec!(0.20),
        CollateralType::OtherPhysical => dec!(0.40),
        CollateralType::ListedEquity if is_main_index => equity_haircut(true, framework),
        CollateralType::ListedEquity | CollateralType::OtherEquity => {
            equity_haircut(false, framework)
        }
        CollateralType::SovereignBond => {
            debt_haircut(issuer_cqs, band, framework, true).unwrap_or(UNRATED_SOVEREIGN_HAIRCUT)
        }
        CollateralType::CorporateBond => {
            debt_haircut(issuer_cqs, band, framework, false).unwrap_or(UNRATED_CORPORATE_HAIRCUT)
        }
    }
}

fn equity_haircut(main_index: bool, framework: RegulatoryFramework) -> Rate {
    match (framework, main_index) {
        (RegulatoryFramework::Crr, true) => dec!(0.15),
        (RegulatoryFramework::Crr, false) => dec!(0.25),
        (RegulatoryFramework::Basel31, true) => dec!(0.25),
        (RegulatoryFramework::Basel31, false) => dec!(0.35),
    }
}

/// Table haircut for rated debt, `None` when unrated or below CQS 3.
fn debt_haircut(
    cqs: Option<u8>,
    band: MaturityBand,
    framework: RegulatoryFramework,
    sovereign: bool,
) -> Option<Rate> {
    let col = band.column();
    let row = match (framework, sovereign, cqs?) {
        (RegulatoryFramework::Crr, true, 1) => &CRR_SOVEREIGN_CQS1[..],
        (RegulatoryFramework::Crr, true, 2 | 3) => &CRR_SOVEREIGN_CQS2_3[..],
        (RegulatoryFramework::Crr, false, 1 | 2) => &CRR_CORPORATE_CQS1_2[..],
        (RegulatoryFramework::Crr, false, 3) => &CRR_CORPORATE_CQS3[..],
        (RegulatoryFramework::Basel31, true, 1) => &B31_SOVEREIGN_CQS1[..],
        (RegulatoryFramework::Basel31, true, 2 | 3) => &B31_SOVEREIGN_CQS2_3[..],
        (RegulatoryFramework::Basel31, false, 1 | 2) => &B31_CORPORATE_CQS1_2[..],
        (RegulatoryFramework::Basel31, false, 3) => &B31_CORPORATE_CQS3[..],
        _ => return None,
    };
    row.get(col).copied()
}

/// Required collateral value per unit of exposure secured.
pub fn overcollateralisation_ratio(collateral_type: CollateralType) -> Decimal {
    match collateral_type {
        CollateralType::Receivable => dec!(1.25),
        CollateralType::RealEstate | CollateralType::OtherPhysical => dec!(1.4),
        _ => Decimal::ONE,
    }
}

/// Minimum share of EAD a collateral item must secure to be recognised.
pub fn minimum_coverage(collateral_type: CollateralType) -> Option<Rate> {
    if collateral_type.has_minimum_coverage() {
        Some(dec!(0.30))
    } else {
        None
    }
}

/// Protection maturity below which mismatched protection is not recognised.
pub const MATURITY_FLOOR: Decimal = dec!(0.25);
pub const MATURITY_CAP: Decimal = dec!(5);

/// Maturity mismatch factor for protection of residual maturity
/// `protection` against an exposure of residual maturity `exposure`.
///
/// Both maturities are floored at three months and the exposure maturity is
/// capped at five years. Returns 1 when the protection outlives the exposure
/// and 0 when mismatched protection has less than three months to run.
pub fn maturity_mismatch_factor(protection: Years, exposure: Years) -> Rate {
    if protection < exposure && protection < MATURITY_FLOOR {
        return Decimal::ZERO;
    }
    let t = protection.max(MATURITY_FLOOR);
    let big_t = exposure.max(MATURITY_FLOOR).min(MATURITY_CAP);
    if t >= big_t {
        return Decimal::ONE;
    }
    (t - MATURITY_FLOOR) / (big_t - MATURITY_FLOOR)
}
