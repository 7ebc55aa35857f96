//! Portfolio module
//!
//! Position state machine.

pub mod position;

pub use position::*;
