//! Credit conversion factors by risk category, approach and framework.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::RegulatoryFramework;
use crate::model::{Approach, RiskCategory};
use crate::types::Rate;

/// Standardised CCF (CRR Art. 111 / Basel 3.1 CRE20.94).
pub fn sa_ccf(category: RiskCategory, framework: RegulatoryFramework) -> Rate {
    match category {
        RiskCategory::Full => dec!(1.00),
        RiskCategory::Medium => dec!(0.50),
        RiskCategory::MediumLow => dec!(0.20),
        RiskCategory::Low => match framework {
            RegulatoryFramework::Crr => Decimal::ZERO,
            RegulatoryFramework::Basel31 => dec!(0.10),
        },
    }
}

/// Foundation IRB supervisory CCF (CRR Art. 166(8)-(9)).
pub fn firb_ccf(
    category: RiskCategory,
    framework: RegulatoryFramework,
    is_short_term_trade_lc: bool,
) -> Rate {
    match category {
        RiskCategory::Full => dec!(1.00),
        RiskCategory::MediumLow if is_short_term_trade_lc => dec!(0.20),
        RiskCategory::Medium | RiskCategory::MediumLow => dec!(0.75),
        RiskCategory::Low => sa_ccf(RiskCategory::Low, framework),
    }
}

/// Supervisory CCF for the approach. A-IRB falls back to the SA value.
pub fn supervisory_ccf(
    category: RiskCategory,
    approach: Approach,
    framework: RegulatoryFramework,
    is_short_term_trade_lc: bool,
) -> Rate {
    match approach {
        Approach::FoundationIrb => firb_ccf(category, framework, is_short_term_trade_lc),
        Approach::Standardised | Approach::AdvancedIrb | Approach::Slotting => {
            sa_ccf(category, framework)
        }
    }
}

/// Floor on a modelled CCF: half the SA CCF under Basel 3.1, none under CRR.
pub fn modelled_ccf_floor(category: RiskCategory, framework: RegulatoryFramework) -> Rate {
    match framework {
        RegulatoryFramework::Crr => Decimal::ZERO,
        RegulatoryFramework::Basel31 => sa_ccf(category, framework) * dec!(0.5),
    }
}
