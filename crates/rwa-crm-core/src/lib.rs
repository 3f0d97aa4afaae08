//! Credit risk mitigation (CRM) waterfall for regulatory capital.
//!
//! Turns classified gross exposures into risk-mitigated exposure-at-default
//! under CRR and Basel 3.1: provisions, credit conversion factors, collateral
//! haircuts and guarantee substitution, applied in that order.

pub mod capital;
pub mod config;
pub mod crm;
pub mod error;
pub mod model;
pub mod parallel;
pub mod tables;
pub mod types;

pub use config::{CollateralMethod, CrmConfig, RegulatoryFramework};
pub use crm::{apply_crm, CrmProcessor};
pub use error::CrmError;
pub use types::*;

/// Standard result type for all CRM operations
pub type CrmResult<T> = Result<T, CrmError>;
