//! Engine module
//!
//! The trading session driving the pipeline.

pub mod session;

pub use session::*;
