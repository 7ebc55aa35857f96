//! Contrarian: bets against the recent mean return

use crate::error::TradingError;
use crate::features::{FeatureSpec, FeatureVector};
use crate::strategy::{Direction, SignalProducer};
use crate::Result;

#[derive(Debug, Clone)]
pub struct Contrarian {
    name: String,
    momentum: FeatureSpec,
}

impl Contrarian {
    pub fn new(name: impl Into<String>, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(TradingError::config("contrarian window must be positive").into());
        }
        Ok(Self {
            name: name.into(),
            momentum: FeatureSpec::Momentum(window),
        })
    }
}

impl SignalProducer for Contrarian {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_features(&self) -> Vec<FeatureSpec> {
        vec![self.momentum.clone()]
    }

    fn predict(&self, features: &FeatureVector) -> Result<Direction> {
        Ok(Direction::from_sign(features.get(&self.momentum)?).negate())
    }
}
