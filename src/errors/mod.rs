//! Error types shared by every swapper entry point

pub mod swap_error;

pub use swap_error::*;
