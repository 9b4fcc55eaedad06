//! Swapper manager: registry, best-quote ranking and the flag-keyed cache

pub mod best_quote;
pub mod cache;
pub mod registry;

pub use best_quote::*;
pub use cache::*;
pub use registry::*;
