//! Producer registry - builds signal producers from strategy settings

use crate::config::{ModelSettings, SessionConfig, StrategyKind, StrategySettings};
use crate::error::TradingError;
use crate::features::FeatureSpec;
use crate::strategy::{
    Autoregressive, BandBreakout, Contrarian, LinearModel, Model, ModelProducer, SignalProducer,
    Standardizer, TrendFollowing,
};
use crate::Result;
use anyhow::Context;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// Model and its standardization parameters
#[derive(Clone)]
pub struct ModelHandle {
    pub model: Arc<dyn Model>,
    pub standardizer: Arc<Standardizer>,
}

pub type ProducerFactory =
    Box<dyn Fn(&StrategySettings, &HashMap<String, ModelHandle>) -> Result<Box<dyn SignalProducer>> + Send + Sync>;

/// Producer factories by strategy kind, plus the model catalogue
pub struct ProducerRegistry {
    factories: HashMap<String, ProducerFactory>,
    models: HashMap<String, ModelHandle>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
            models: HashMap::new(),
        };

        registry.register_producer("trend_following", |settings, _| match settings.kind {
            StrategyKind::TrendFollowing {
                short_window,
                long_window,
            } => Ok(Box::new(TrendFollowing::new(&settings.name, short_window, long_window)?)),
            _ => Err(kind_mismatch(settings)),
        });

        registry.register_producer("contrarian", |settings, _| match settings.kind {
            StrategyKind::Contrarian { window } => Ok(Box::new(Contrarian::new(&settings.name, window)?)),
            _ => Err(kind_mismatch(settings)),
        });

        registry.register_producer("band_breakout", |settings, _| match settings.kind {
            StrategyKind::BandBreakout { window, deviations } => {
                Ok(Box::new(BandBreakout::new(&settings.name, window, deviations)?))
            }
            _ => Err(kind_mismatch(settings)),
        });

        registry.register_producer("autoregressive", |settings, _| match settings.kind {
            StrategyKind::Autoregressive { p, d, window } => {
                Ok(Box::new(Autoregressive::new(&settings.name, p, d, window)?))
            }
            _ => Err(kind_mismatch(settings)),
        });

        registry.register_producer("model", |settings, models| match &settings.kind {
            StrategyKind::Model {
                model,
                features,
                output,
            } => {
                let handle = models.get(model).ok_or_else(|| {
                    TradingError::config(format!(
                        "strategy `{}` uses unknown model `{}`",
                        settings.name, model
                    ))
                })?;
                let features = features
                    .iter()
                    .map(|name| name.parse::<FeatureSpec>())
                    .collect::<Result<Vec<_>>>()?;
                Ok(Box::new(ModelProducer::new(
                    &settings.name,
                    features,
                    Arc::clone(&handle.model),
                    Arc::clone(&handle.standardizer),
                    *output,
                )?))
            }
            _ => Err(kind_mismatch(settings)),
        });

        registry
    }

    /// Register a producer factory for a strategy kind
    pub fn register_producer<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&StrategySettings, &HashMap<String, ModelHandle>) -> Result<Box<dyn SignalProducer>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    /// Register a model under a handle name
    pub fn register_model(&mut self, name: &str, model: Arc<dyn Model>, standardizer: Standardizer) {
        self.models.insert(
            name.to_string(),
            ModelHandle {
                model,
                standardizer: Arc::new(standardizer),
            },
        );
    }

    /// Load JSON linear models and their parameter files
    pub fn load_models(&mut self, models: &BTreeMap<String, ModelSettings>) -> Result<()> {
        for (name, settings) in models {
            let model = LinearModel::from_file(&settings.model)?;
            let standardizer = match &settings.params {
                Some(path) => Standardizer::from_file(path)
                    .with_context(|| format!("failed to load parameters of model `{}`", name))?,
                None => Standardizer::identity(),
            };
            info!("Loaded model `{}` from {}", name, settings.model.display());
            self.register_model(name, Arc::new(model), standardizer);
        }
        Ok(())
    }

    /// Create one producer
    pub fn create(&self, settings: &StrategySettings) -> Result<Box<dyn SignalProducer>> {
        let kind = settings.kind.label();
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| TradingError::config(format!("unknown strategy kind: {}", kind)))?;
        factory(settings, &self.models)
            .with_context(|| format!("failed to create strategy `{}`", settings.name))
    }

    /// Create the producers of a session, in configured order
    pub fn create_all(&self, config: &SessionConfig) -> Result<Vec<Box<dyn SignalProducer>>> {
        config.strategies.iter().map(|s| self.create(s)).collect()
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Get list of available strategy kinds
    pub fn available_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for ProducerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_mismatch(settings: &StrategySettings) -> anyhow::Error {
    TradingError::config(format!(
        "strategy `{}` is not of kind {}",
        settings.name,
        settings.kind.label()
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Link;

    fn settings(json: &str) -> StrategySettings {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = ProducerRegistry::new();
        assert_eq!(
            registry.available_kinds(),
            vec!["autoregressive", "band_breakout", "contrarian", "model", "trend_following"]
        );
        let producer = registry
            .create(&settings(r#"{"name": "sma", "kind": "trend_following", "short_window": 50, "long_window": 200}"#))
            .unwrap();
        assert_eq!(producer.name(), "sma");
        assert_eq!(producer.required_features(), vec![FeatureSpec::Mean(50), FeatureSpec::Mean(200)]);

        let arima = registry
            .create(&settings(r#"{"name": "arima", "kind": "autoregressive", "p": 1, "d": 1, "window": 30}"#))
            .unwrap();
        assert_eq!(arima.price_window(), 30);
    }

    #[test]
    fn test_model_strategy_needs_known_model() {
        let mut registry = ProducerRegistry::new();
        let json = r#"{"name": "lr", "kind": "model", "model": "lr", "features": ["dir_lag_1", "dir_lag_2"]}"#;
        assert!(registry.create(&settings(json)).is_err());

        registry.register_model(
            "lr",
            Arc::new(LinearModel::new(vec![0.3, 0.2], 0.0, Link::Identity)),
            Standardizer::identity(),
        );
        assert!(registry.has_model("lr"));
        let producer = registry.create(&settings(json)).unwrap();
        assert_eq!(producer.required_features().len(), 2);
    }

    #[test]
    fn test_invalid_parameters_are_config_errors() {
        let registry = ProducerRegistry::new();
        let err = registry
            .create(&settings(r#"{"name": "boll", "kind": "band_breakout", "window": 1, "deviations": 2.0}"#))
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<TradingError>(),
            Some(TradingError::Config(_))
        ));
    }
}
