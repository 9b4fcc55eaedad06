//! Rate and fee composition over trade amount state

pub mod amounts;

pub use amounts::*;
