//! Closed bars and the bar history

use crate::config::BarLength;
use crate::error::TradingError;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Closed bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar-close instant (right edge of the bucket)
    pub timestamp: DateTime<Utc>,
    /// Last observed price in the bucket
    pub price: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Start of the epoch-aligned bucket containing `ts`
pub fn bucket_open(ts: DateTime<Utc>, bar_length: BarLength) -> DateTime<Utc> {
    let len = bar_length.as_millis();
    let ms = ts.timestamp_millis();
    let open = ms - ms.rem_euclid(len);
    DateTime::from_timestamp_millis(open).unwrap_or(ts)
}

/// Close label of the bucket containing `ts`, covering `[label - bar_length, label)`
pub fn bucket_close(ts: DateTime<Utc>, bar_length: BarLength) -> DateTime<Utc> {
    bucket_open(ts, bar_length) + bar_length.as_duration()
}

/// Append-only bar history of one instrument
#[derive(Debug, Clone, Default)]
pub struct BarHistory {
    bars: Vec<Bar>,
}

impl BarHistory {
    pub fn new() -> Self {
        Self { bars: Vec::new() }
    }

    /// Build a history from bars that must already be strictly ordered
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self> {
        let mut history = Self::new();
        for bar in bars {
            history.push(bar)?;
        }
        Ok(history)
    }

    /// Append a bar; its timestamp must follow the last one
    pub fn push(&mut self, bar: Bar) -> Result<()> {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                return Err(TradingError::OutOfOrderBar {
                    last: last.timestamp,
                    next: bar.timestamp,
                }
                .into());
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// History truncated to the bars closed at or before `ts`
    pub fn until(&self, ts: DateTime<Utc>) -> &[Bar] {
        let end = self.bars.partition_point(|bar| bar.timestamp <= ts);
        &self.bars[..end]
    }

    /// Largest gap between consecutive bars, if any
    pub fn max_spacing(&self) -> Option<Duration> {
        self.bars
            .windows(2)
            .map(|pair| pair[1].timestamp - pair[0].timestamp)
            .max()
    }
}
