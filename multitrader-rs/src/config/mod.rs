//! Configuration module

pub mod session;
pub mod strategy;

pub use session::*;
pub use strategy::*;
