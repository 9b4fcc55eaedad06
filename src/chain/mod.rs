//! Chain adapters, wallets and the adapter registry

pub mod adapter;
pub mod evm;
pub mod wallet;

pub use adapter::*;
pub use evm::*;
pub use wallet::*;
