//! Bollinger band breakout
//!
//! Long below the lower band, short above the upper band, flat on the bar where
//! price crosses the mean. Between the bands the last opinion of a closed bar
//! is held.

use crate::error::TradingError;
use crate::features::{FeatureSpec, FeatureVector};
use crate::strategy::{Direction, SignalProducer};
use crate::Result;

#[derive(Debug, Clone)]
pub struct BandBreakout {
    name: String,
    deviations: f64,
    mean: FeatureSpec,
    std: FeatureSpec,
    prev_price: FeatureSpec,
    prev_mean: FeatureSpec,
    /// Last fresh opinion of a closed bar, `None` until a band is first touched
    held: Option<Direction>,
}

impl BandBreakout {
    pub fn new(name: impl Into<String>, window: usize, deviations: f64) -> Result<Self> {
        if window < 2 {
            return Err(TradingError::config("band window must be at least 2").into());
        }
        if !deviations.is_finite() || deviations < 0.0 {
            return Err(TradingError::config("band deviations must be a non-negative number").into());
        }
        Ok(Self {
            name: name.into(),
            deviations,
            mean: FeatureSpec::Mean(window),
            std: FeatureSpec::Std(window),
            prev_price: FeatureSpec::Price.lag(1),
            prev_mean: FeatureSpec::Mean(window).lag(1),
            held: None,
        })
    }

    pub fn held(&self) -> Option<Direction> {
        self.held
    }

    /// Fresh opinion of one row, `None` between the bands
    fn fresh(&self, features: &FeatureVector) -> Result<Option<Direction>> {
        let price = features.get(&FeatureSpec::Price)?;
        let mean = features.get(&self.mean)?;
        let std = features.get(&self.std)?;
        let distance = price - mean;
        let prev_distance = features.get(&self.prev_price)? - features.get(&self.prev_mean)?;

        let mut fresh = None;
        if price < mean - self.deviations * std {
            fresh = Some(Direction::Long);
        }
        if price > mean + self.deviations * std {
            fresh = Some(Direction::Short);
        }
        if distance * prev_distance < 0.0 {
            fresh = Some(Direction::Flat);
        }
        Ok(fresh)
    }
}

impl SignalProducer for BandBreakout {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_features(&self) -> Vec<FeatureSpec> {
        vec![
            FeatureSpec::Price,
            self.mean.clone(),
            self.std.clone(),
            self.prev_price.clone(),
            self.prev_mean.clone(),
        ]
    }

    fn predict(&self, features: &FeatureVector) -> Result<Direction> {
        Ok(self.fresh(features)?.or(self.held).unwrap_or(Direction::Flat))
    }

    fn observe_closed(&mut self, row: &FeatureVector) -> Result<()> {
        self.held = self.fresh(row)?.or(self.held);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(price: f64, mean: f64, std: f64, prev_price: f64, prev_mean: f64) -> FeatureVector {
        FeatureVector {
            timestamp: Utc::now(),
            price,
            values: [
                ("price".to_string(), price),
                ("sma_20".to_string(), mean),
                ("std_20".to_string(), std),
                ("price_lag_1".to_string(), prev_price),
                ("sma_20_lag_1".to_string(), prev_mean),
            ]
            .into(),
            recent_prices: vec![],
        }
    }

    #[test]
    fn test_defaults_to_flat_until_band_touch() {
        let mut producer = BandBreakout::new("boll", 20, 2.0).unwrap();
        let inside = row(1.01, 1.0, 0.01, 1.01, 1.0);
        assert_eq!(producer.predict(&inside).unwrap(), Direction::Flat);
        producer.observe_closed(&inside).unwrap();
        assert_eq!(producer.held(), None);
    }

    #[test]
    fn test_breakout_and_hold() {
        let mut producer = BandBreakout::new("boll", 20, 2.0).unwrap();
        // below the lower band
        let below = row(0.97, 1.0, 0.01, 0.99, 1.0);
        assert_eq!(producer.predict(&below).unwrap(), Direction::Long);
        producer.observe_closed(&below).unwrap();
        // back between the bands, still below the mean
        assert_eq!(producer.predict(&row(0.99, 1.0, 0.01, 0.97, 1.0)).unwrap(), Direction::Long);
        // above the upper band without crossing from below in one step
        assert_eq!(producer.predict(&row(1.03, 1.0, 0.01, 1.01, 1.0)).unwrap(), Direction::Short);
    }

    #[test]
    fn test_mean_cross_forces_flat() {
        let mut producer = BandBreakout::new("boll", 20, 2.0).unwrap();
        producer.observe_closed(&row(0.97, 1.0, 0.01, 0.99, 1.0)).unwrap();
        assert_eq!(producer.held(), Some(Direction::Long));
        // crosses the mean, even straight through the upper band
        let cross = row(1.05, 1.0, 0.01, 0.99, 1.0);
        assert_eq!(producer.predict(&cross).unwrap(), Direction::Flat);
        producer.observe_closed(&cross).unwrap();
        assert_eq!(producer.held(), Some(Direction::Flat));
        // flat is then held
        assert_eq!(producer.predict(&row(1.01, 1.0, 0.01, 1.05, 1.0)).unwrap(), Direction::Flat);
    }

    #[test]
    fn test_provisional_row_does_not_move_held_state() {
        let mut producer = BandBreakout::new("boll", 20, 2.0).unwrap();
        producer.observe_closed(&row(0.97, 1.0, 0.01, 0.99, 1.0)).unwrap();
        // a tick spiking through the upper band is judged but not kept
        assert_eq!(producer.predict(&row(1.03, 1.0, 0.01, 1.01, 1.0)).unwrap(), Direction::Short);
        assert_eq!(producer.held(), Some(Direction::Long));
        assert_eq!(producer.predict(&row(0.99, 1.0, 0.01, 0.98, 1.0)).unwrap(), Direction::Long);
    }

    #[test]
    fn test_warm_up_replays_rows() {
        let mut producer = BandBreakout::new("boll", 20, 2.0).unwrap();
        producer
            .warm_up(&[row(1.03, 1.0, 0.01, 1.01, 1.0), row(1.01, 1.0, 0.01, 1.03, 1.0)])
            .unwrap();
        assert_eq!(producer.held(), Some(Direction::Short));
    }
}
