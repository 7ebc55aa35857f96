//! Base signal producer trait

use crate::features::{FeatureSpec, FeatureVector};
use crate::strategy::Direction;
use crate::Result;

/// Turns a feature vector into a directional opinion
///
/// Producers that carry an opinion forward between rows advance it only in
/// `observe_closed`. `predict` usually sees the provisional row of the forming
/// bar and must leave that state untouched.
pub trait SignalProducer: Send {
    /// Strategy name, the key of its opinion
    fn name(&self) -> &str;

    /// Features that must be present in every vector passed to `predict`
    fn required_features(&self) -> Vec<FeatureSpec>;

    /// Trailing prices needed in `FeatureVector::recent_prices`
    fn price_window(&self) -> usize {
        0
    }

    /// Opinion for the newest row
    fn predict(&self, features: &FeatureVector) -> Result<Direction>;

    /// Advance carried state over the row of a closed bar
    fn observe_closed(&mut self, _row: &FeatureVector) -> Result<()> {
        Ok(())
    }

    /// Replay closed rows, oldest first
    fn warm_up(&mut self, rows: &[FeatureVector]) -> Result<()> {
        for row in rows {
            self.observe_closed(row)?;
        }
        Ok(())
    }
}
