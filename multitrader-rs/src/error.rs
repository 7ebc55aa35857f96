//! Domain errors that callers need to tell apart.
//!
//! Everything else travels as a plain `anyhow::Error` with context attached.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradingError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("feature `{0}` is missing from the feature vector")]
    MissingFeature(String),

    #[error("no opinion from strategy `{0}`")]
    MissingOpinion(String),

    #[error("strategy `{strategy}` failed: {reason}")]
    Producer { strategy: String, reason: String },

    #[error("order for {units} units of {instrument} was not confirmed: {reason}")]
    OrderRejected {
        instrument: String,
        units: i64,
        reason: String,
    },

    #[error("backfill still stale after {attempts} attempts (latest bar: {latest:?})")]
    StaleBackfill {
        attempts: u32,
        latest: Option<DateTime<Utc>>,
    },

    #[error("observation at {next} precedes the observation at {previous}")]
    OutOfOrderPoint {
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    #[error("bar at {next} does not follow the last bar at {last}")]
    OutOfOrderBar {
        last: DateTime<Utc>,
        next: DateTime<Utc>,
    },
}

impl TradingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
