//! Model-inference collaborators
//!
//! A [`Model`] maps one standardized feature row to a score. [`LinearModel`] is
//! the JSON-loadable implementation for models exported by a training pipeline.

use crate::error::TradingError;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Externally trained model
pub trait Model: Send + Sync {
    /// Score of one feature row, columns in configured feature order
    fn predict(&self, features: &[f64]) -> Result<f64>;

    /// Expected number of columns, when known
    fn input_size(&self) -> Option<usize> {
        None
    }
}

/// Output link of a linear model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    /// Raw score (regression, or a signed decision function)
    #[default]
    Identity,
    /// Probability of the positive class
    Logistic,
}

/// Linear model: `link(intercept + coefficients . x)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub link: Link,
}

impl LinearModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64, link: Link) -> Self {
        Self {
            coefficients,
            intercept,
            link,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json).context("invalid linear model")?;
        if model.coefficients.is_empty() {
            return Err(TradingError::config("linear model has no coefficients").into());
        }
        Ok(model)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("failed to load model {}", path.display()))
    }
}

impl Model for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            return Err(anyhow::anyhow!(
                "model expects {} features, got {}",
                self.coefficients.len(),
                features.len()
            ));
        }
        let score = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>();
        Ok(match self.link {
            Link::Identity => score,
            Link::Logistic => 1.0 / (1.0 + (-score).exp()),
        })
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }
}

/// Per-feature standardization `(x - mean) / scale`, fixed for the session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Standardizer {
    #[serde(default, alias = "mu")]
    pub mean: BTreeMap<String, f64>,
    #[serde(default, alias = "std")]
    pub scale: BTreeMap<String, f64>,
}

impl Standardizer {
    /// No-op standardization
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid standardization parameters")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read parameters {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn is_identity(&self) -> bool {
        self.mean.is_empty() && self.scale.is_empty()
    }

    /// Check that every feature has usable parameters
    pub fn check(&self, features: &[String]) -> Result<()> {
        if self.is_identity() {
            return Ok(());
        }
        for name in features {
            let mean = self.mean.get(name);
            let scale = self.scale.get(name);
            match (mean, scale) {
                (Some(m), Some(s)) if m.is_finite() && s.is_finite() && *s != 0.0 => {}
                _ => {
                    return Err(TradingError::config(format!(
                        "missing or invalid standardization parameters for `{}`",
                        name
                    ))
                    .into())
                }
            }
        }
        Ok(())
    }

    pub fn apply(&self, features: &[String], values: &[f64]) -> Result<Vec<f64>> {
        if self.is_identity() {
            return Ok(values.to_vec());
        }
        features
            .iter()
            .zip(values)
            .map(|(name, value)| {
                match (self.mean.get(name), self.scale.get(name)) {
                    (Some(m), Some(s)) => Ok((value - m) / s),
                    _ => Err(TradingError::MissingFeature(name.clone()).into()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_model_json() {
        let model = LinearModel::from_json_str(
            r#"{"coefficients": [2.0, -1.0], "intercept": 0.5, "link": "logistic"}"#,
        )
        .unwrap();
        assert_eq!(model.input_size(), Some(2));
        let p = model.predict(&[0.25, 1.0]).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
        assert!(model.predict(&[1.0]).is_err());
        assert!(LinearModel::from_json_str(r#"{"coefficients": []}"#).is_err());
    }

    #[test]
    fn test_standardizer() {
        let params = Standardizer::from_json_str(
            r#"{"mu": {"a": 1.0, "b": 0.0}, "std": {"a": 2.0, "b": 0.5}}"#,
        )
        .unwrap();
        let names = vec!["a".to_string(), "b".to_string()];
        params.check(&names).unwrap();
        assert_eq!(params.apply(&names, &[3.0, 1.0]).unwrap(), vec![1.0, 2.0]);
        assert!(params.check(&["c".to_string()]).is_err());

        let identity = Standardizer::identity();
        identity.check(&names).unwrap();
        assert_eq!(identity.apply(&names, &[3.0, 1.0]).unwrap(), vec![3.0, 1.0]);
    }
}
