//! Model-backed producer

use crate::config::OutputPolicy;
use crate::error::TradingError;
use crate::features::{FeatureSpec, FeatureVector};
use crate::strategy::{Direction, Model, SignalProducer, Standardizer};
use crate::Result;
use std::sync::Arc;

/// Standardizes the configured features, asks the model and interprets the output
pub struct ModelProducer {
    name: String,
    features: Vec<FeatureSpec>,
    columns: Vec<String>,
    model: Arc<dyn Model>,
    standardizer: Arc<Standardizer>,
    policy: OutputPolicy,
    /// Last opinion outside the dead band
    held: Option<Direction>,
}

impl ModelProducer {
    pub fn new(
        name: impl Into<String>,
        features: Vec<FeatureSpec>,
        model: Arc<dyn Model>,
        standardizer: Arc<Standardizer>,
        policy: OutputPolicy,
    ) -> Result<Self> {
        let name = name.into();
        if features.is_empty() {
            return Err(TradingError::config(format!("model strategy `{}` has no features", name)).into());
        }
        if let Some(size) = model.input_size() {
            if size != features.len() {
                return Err(TradingError::config(format!(
                    "model strategy `{}` configures {} features, model expects {}",
                    name,
                    features.len(),
                    size
                ))
                .into());
            }
        }
        if let OutputPolicy::DeadBand { low, high } = policy {
            if !(low <= high) {
                return Err(TradingError::config(format!(
                    "dead band of `{}` needs low <= high, got {} / {}",
                    name, low, high
                ))
                .into());
            }
        }
        let columns: Vec<String> = features.iter().map(ToString::to_string).collect();
        standardizer.check(&columns)?;

        Ok(Self {
            name,
            features,
            columns,
            model,
            standardizer,
            policy,
            held: None,
        })
    }

    pub fn held(&self) -> Option<Direction> {
        self.held
    }

    /// Raw model output for one row
    fn output(&self, features: &FeatureVector) -> Result<f64> {
        let values = self
            .features
            .iter()
            .map(|spec| features.get(spec))
            .collect::<Result<Vec<f64>>>()?;
        let inputs = self.standardizer.apply(&self.columns, &values)?;
        let output = self.model.predict(&inputs).map_err(|e| TradingError::Producer {
            strategy: self.name.clone(),
            reason: e.to_string(),
        })?;
        if !output.is_finite() {
            return Err(TradingError::Producer {
                strategy: self.name.clone(),
                reason: format!("non-finite model output {}", output),
            }
            .into());
        }
        Ok(output)
    }
}

/// Opinion outside the dead band, `None` inside it
fn outside_band(output: f64, low: f64, high: f64) -> Option<Direction> {
    if output < low {
        Some(Direction::Short)
    } else if output > high {
        Some(Direction::Long)
    } else {
        None
    }
}

impl SignalProducer for ModelProducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_features(&self) -> Vec<FeatureSpec> {
        self.features.clone()
    }

    fn predict(&self, features: &FeatureVector) -> Result<Direction> {
        let output = self.output(features)?;
        let opinion = match self.policy {
            OutputPolicy::Direction => Direction::from_sign(output),
            OutputPolicy::DeadBand { low, high } => outside_band(output, low, high)
                .or(self.held)
                .unwrap_or(Direction::Flat),
        };
        Ok(opinion)
    }

    fn observe_closed(&mut self, row: &FeatureVector) -> Result<()> {
        if let OutputPolicy::DeadBand { low, high } = self.policy {
            let output = self.output(row)?;
            self.held = outside_band(output, low, high).or(self.held);
        }
        Ok(())
    }
}
