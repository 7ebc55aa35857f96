//! Feature module
//!
//! Named features and the engine that computes them over bar history.

pub mod engine;
pub mod feature;

pub use engine::*;
pub use feature::*;
