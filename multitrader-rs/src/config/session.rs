//! Session configuration

use crate::config::{ModelSettings, StrategySettings};
use crate::error::TradingError;
use crate::strategy::CombinerPolicy;
use crate::Result;
use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Session configuration, fixed at session start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Instrument identifier (e.g., "EUR_USD")
    pub instrument: String,
    /// Bar length (e.g., "1min")
    pub bar_length: BarLength,
    /// Base unit size of one position
    pub units: i64,
    /// Voting policy of the signal combiner
    #[serde(default)]
    pub combiner: CombinerPolicy,
    /// Strategy label written with every trade record
    #[serde(default = "default_strategy_label")]
    pub strategy_label: String,
    /// Stop after this many ticks
    #[serde(default)]
    pub max_ticks: Option<u64>,
    /// Historical backfill policy
    #[serde(default)]
    pub backfill: BackfillSettings,
    /// Model handles, by name
    #[serde(default)]
    pub models: BTreeMap<String, ModelSettings>,
    /// Participating strategies
    pub strategies: Vec<StrategySettings>,
}

fn default_strategy_label() -> String {
    "multi".to_string()
}

impl SessionConfig {
    /// Parse from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid session configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session configuration {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Check the settings that do not depend on a particular producer
    pub fn validate(&self) -> Result<()> {
        if self.instrument.trim().is_empty() {
            return Err(TradingError::config("instrument cannot be empty").into());
        }
        if self.units <= 0 {
            return Err(TradingError::config(format!("units must be positive, got {}", self.units)).into());
        }
        if self.strategies.is_empty() {
            return Err(TradingError::config("at least one strategy is required").into());
        }
        let mut names = HashSet::new();
        for strategy in &self.strategies {
            if !names.insert(strategy.name.as_str()) {
                return Err(TradingError::config(format!("duplicate strategy name `{}`", strategy.name)).into());
            }
        }
        self.backfill.validate()
    }
}

/// Longest backfill window accepted
pub const MAX_BACKFILL_DAYS: i64 = 366;

/// Longest bar accepted
pub const MAX_BAR_SECS: i64 = 7 * 86_400;

/// Historical backfill policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSettings {
    /// Trailing window to fetch, in days
    #[serde(default = "default_backfill_days")]
    pub days: i64,
    /// Provider granularity of the fetched series (e.g., "S5")
    #[serde(default = "default_granularity")]
    pub granularity: String,
    /// Delay between two attempts
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Give up after this many stale snapshots (`null` retries forever)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
}

fn default_backfill_days() -> i64 {
    5
}

fn default_granularity() -> String {
    "S5".to_string()
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_max_attempts() -> Option<u32> {
    Some(30)
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            days: default_backfill_days(),
            granularity: default_granularity(),
            retry_delay_secs: default_retry_delay_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl BackfillSettings {
    pub fn retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.retry_delay_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.days <= 0 || self.days > MAX_BACKFILL_DAYS {
            return Err(TradingError::config(format!(
                "backfill days must be between 1 and {}, got {}",
                MAX_BACKFILL_DAYS, self.days
            ))
            .into());
        }
        if self.max_attempts == Some(0) {
            return Err(TradingError::config("backfill max_attempts must be at least 1").into());
        }
        Ok(())
    }
}

/// Length of one bar
///
/// Parsed from pandas-style strings: `"30s"`, `"1min"`, `"15min"`, `"1h"`, `"1d"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BarLength {
    seconds: i64,
}

impl BarLength {
    pub fn from_secs(seconds: i64) -> Result<Self> {
        if seconds <= 0 || seconds > MAX_BAR_SECS {
            return Err(TradingError::config(format!(
                "bar length must be between 1s and {}s, got {}s",
                MAX_BAR_SECS, seconds
            ))
            .into());
        }
        Ok(Self { seconds })
    }

    pub fn as_secs(&self) -> i64 {
        self.seconds
    }

    pub fn as_millis(&self) -> i64 {
        self.seconds * 1000
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }
}

impl FromStr for BarLength {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);
        let count: i64 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .with_context(|| format!("invalid bar length `{}`", s))?
        };
        let multiplier = match unit {
            "s" | "S" | "sec" | "secs" => 1,
            "min" | "mins" | "T" | "m" => 60,
            "h" | "H" | "hour" | "hours" => 3_600,
            "d" | "D" | "day" | "days" => 86_400,
            _ => return Err(TradingError::config(format!("unknown bar length unit in `{}`", s)).into()),
        };
        let seconds = count
            .checked_mul(multiplier)
            .ok_or_else(|| TradingError::config(format!("bar length `{}` is out of range", s)))?;
        Self::from_secs(seconds)
    }
}

impl TryFrom<String> for BarLength {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BarLength> for String {
    fn from(value: BarLength) -> Self {
        value.to_string()
    }
}

impl fmt::Display for BarLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seconds {
            s if s % 86_400 == 0 => write!(f, "{}d", s / 86_400),
            s if s % 3_600 == 0 => write!(f, "{}h", s / 3_600),
            s if s % 60 == 0 => write!(f, "{}min", s / 60),
            s => write!(f, "{}s", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "instrument": "EUR_USD",
        "bar_length": "1min",
        "units": 100000,
        "combiner": "sign_of_sum",
        "strategies": [
            {"name": "sma", "kind": "trend_following", "short_window": 50, "long_window": 200},
            {"name": "contrarian", "kind": "contrarian", "window": 1}
        ]
    }"#;

    #[test]
    fn test_bar_length_parsing() {
        assert_eq!("1min".parse::<BarLength>().unwrap().as_secs(), 60);
        assert_eq!("30s".parse::<BarLength>().unwrap().as_secs(), 30);
        assert_eq!("5T".parse::<BarLength>().unwrap().as_secs(), 300);
        assert_eq!("1h".parse::<BarLength>().unwrap().as_secs(), 3_600);
        assert_eq!("min".parse::<BarLength>().unwrap().as_secs(), 60);
        assert!("0min".parse::<BarLength>().is_err());
        assert!("3weeks".parse::<BarLength>().is_err());
        assert_eq!("15min".parse::<BarLength>().unwrap().to_string(), "15min");
    }

    #[test]
    fn test_bar_length_rejects_huge_values() {
        let err = "99999999999999999d".parse::<BarLength>().unwrap_err();
        assert!(matches!(err.downcast_ref::<TradingError>(), Some(TradingError::Config(_))));
        assert!("8d".parse::<BarLength>().is_err());
        assert_eq!("7d".parse::<BarLength>().unwrap().as_secs(), MAX_BAR_SECS);
    }

    #[test]
    fn test_backfill_days_are_bounded() {
        let json = SAMPLE.replace(
            "\"combiner\"",
            "\"backfill\": {\"days\": 9223372036854775807}, \"combiner\"",
        );
        let err = SessionConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err.downcast_ref::<TradingError>(), Some(TradingError::Config(_))));
        let json = SAMPLE.replace("\"combiner\"", "\"backfill\": {\"days\": 30}, \"combiner\"");
        assert_eq!(SessionConfig::from_json_str(&json).unwrap().backfill.days, 30);
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.instrument, "EUR_USD");
        assert_eq!(config.bar_length.as_secs(), 60);
        assert_eq!(config.combiner, CombinerPolicy::SignOfSum);
        assert_eq!(config.strategy_label, "multi");
        assert_eq!(config.backfill.granularity, "S5");
        assert_eq!(config.backfill.max_attempts, Some(30));
        assert_eq!(config.strategies.len(), 2);
    }

    #[test]
    fn test_session_config_rejects_duplicates() {
        let json = SAMPLE.replace("\"name\": \"contrarian\"", "\"name\": \"sma\"");
        let err = SessionConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TradingError>(),
            Some(TradingError::Config(_))
        ));
    }

    #[test]
    fn test_session_config_rejects_empty_strategy_list() {
        let json = r#"{"instrument": "EUR_USD", "bar_length": "1min", "units": 1, "strategies": []}"#;
        assert!(SessionConfig::from_json_str(json).is_err());
    }
}
