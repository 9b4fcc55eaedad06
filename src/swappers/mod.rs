//! Venue implementations of the `Swapper` capability

pub mod cow;
pub mod lifi;
pub mod osmosis;
pub mod thorchain;
pub mod zrx;

pub use cow::CowSwapper;
pub use lifi::LifiSwapper;
pub use osmosis::OsmosisSwapper;
pub use thorchain::ThorchainSwapper;
pub use zrx::{zrx_chain, ZrxSwapper};
