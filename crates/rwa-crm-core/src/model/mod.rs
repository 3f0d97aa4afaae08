//! Input and output records of the CRM waterfall.

pub mod adjusted;
pub mod exposure;
pub mod mitigants;

pub use adjusted::*;
pub use exposure::*;
pub use mitigants::*;
