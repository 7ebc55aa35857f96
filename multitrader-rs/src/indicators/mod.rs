//! Technical indicators module
//!
//! Rolling window statistics built on the `ta` crate.

pub mod rolling;

pub use rolling::*;

/// Indicator trait for all indicators
pub trait Indicator {
    /// Get the name of the indicator
    fn name(&self) -> &str;

    /// Update indicator with new value
    fn update(&mut self, value: f64);

    /// Get current indicator value
    fn value(&self) -> Option<f64>;

    /// Check if indicator is ready (has enough data)
    fn is_ready(&self) -> bool;
}
