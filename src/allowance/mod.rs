//! ERC20 allowance logic gating EVM trade execution

pub mod erc20;
pub mod approval;

pub use erc20::*;
pub use approval::*;
