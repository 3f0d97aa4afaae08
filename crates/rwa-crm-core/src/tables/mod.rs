//! Regulatory lookup tables. Pure data, no dependencies on the waterfall.

pub mod ccf;
pub mod haircuts;
pub mod risk_weights;
