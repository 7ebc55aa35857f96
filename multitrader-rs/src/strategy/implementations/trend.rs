//! Trend following: short rolling mean against long rolling mean

use crate::error::TradingError;
use crate::features::{FeatureSpec, FeatureVector};
use crate::strategy::{Direction, SignalProducer};
use crate::Result;

#[derive(Debug, Clone)]
pub struct TrendFollowing {
    name: String,
    short: FeatureSpec,
    long: FeatureSpec,
}

impl TrendFollowing {
    pub fn new(name: impl Into<String>, short_window: usize, long_window: usize) -> Result<Self> {
        if short_window == 0 || long_window == 0 {
            return Err(TradingError::config("trend following windows must be positive").into());
        }
        Ok(Self {
            name: name.into(),
            short: FeatureSpec::Mean(short_window),
            long: FeatureSpec::Mean(long_window),
        })
    }
}

impl SignalProducer for TrendFollowing {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_features(&self) -> Vec<FeatureSpec> {
        vec![self.short.clone(), self.long.clone()]
    }

    fn predict(&self, features: &FeatureVector) -> Result<Direction> {
        let short = features.get(&self.short)?;
        let long = features.get(&self.long)?;
        Ok(if short > long {
            Direction::Long
        } else {
            Direction::Short
        })
    }
}
