//! Core data types and structures

pub mod caip;
pub mod assets;
pub mod swapper;
pub mod quote;
pub mod trade;

pub use caip::*;
pub use assets::*;
pub use swapper::*;
pub use quote::*;
pub use trade::*;
