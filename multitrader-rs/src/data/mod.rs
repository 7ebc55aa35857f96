//! Data module
//!
//! Ticks, closed bars, bar aggregation and the backfill bootstrap.

pub mod aggregator;
pub mod backfill;
pub mod bar;
pub mod tick;

pub use aggregator::*;
pub use backfill::*;
pub use bar::*;
pub use tick::*;
