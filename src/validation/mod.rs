//! Validation of venue responses, rates and pool depth

pub mod price;
pub mod liquidity;
pub mod response;

pub use price::*;
pub use liquidity::*;
pub use response::*;
