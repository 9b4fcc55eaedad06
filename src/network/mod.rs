//! Venue HTTP access and polling

pub mod http;
pub mod poll;

pub use http::*;
pub use poll::*;
