//! Swapper capability shared by all venues

pub mod api;

pub use api::*;
