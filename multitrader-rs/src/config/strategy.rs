//! Strategy configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One participating strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySettings {
    /// Strategy name, unique per session
    pub name: String,
    /// Producer kind and its parameters
    #[serde(flatten)]
    pub kind: StrategyKind,
}

/// Producer kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
    /// Short rolling mean against long rolling mean
    TrendFollowing { short_window: usize, long_window: usize },
    /// Negated sign of the rolling mean of log returns
    Contrarian { window: usize },
    /// Bollinger band breakout
    BandBreakout { window: usize, deviations: f64 },
    /// ARIMA(p, d, 0) one-step forecast over the trailing window
    Autoregressive { p: usize, d: usize, window: usize },
    /// External model over named features
    Model {
        /// Model handle, a key of `SessionConfig::models`
        model: String,
        /// Feature names in model column order
        features: Vec<String>,
        #[serde(default)]
        output: OutputPolicy,
    },
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::TrendFollowing { .. } => "trend_following",
            StrategyKind::Contrarian { .. } => "contrarian",
            StrategyKind::BandBreakout { .. } => "band_breakout",
            StrategyKind::Autoregressive { .. } => "autoregressive",
            StrategyKind::Model { .. } => "model",
        }
    }
}

/// How a model output becomes an opinion
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputPolicy {
    /// Sign of the output (class label or signed score)
    #[default]
    Direction,
    /// Up-move probability with a held dead band between `low` and `high`
    DeadBand { low: f64, high: f64 },
}

/// Files of one model handle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model file (JSON)
    pub model: PathBuf,
    /// Standardization parameters (JSON with `mean` and `scale` maps)
    #[serde(default)]
    pub params: Option<PathBuf>,
}
