//! Ticks and the tick buffer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw bid/ask update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        Self { timestamp, bid, ask }
    }

    /// Representative price
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Both sides finite and positive
    pub fn is_valid(&self) -> bool {
        self.bid.is_finite() && self.ask.is_finite() && self.bid > 0.0 && self.ask > 0.0
    }
}

/// Timestamped price observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

impl From<Tick> for PricePoint {
    fn from(tick: Tick) -> Self {
        Self::new(tick.timestamp, tick.mid())
    }
}

/// Observations that arrived after the last closed bar
#[derive(Debug, Clone, Default)]
pub struct TickBuffer {
    points: Vec<PricePoint>,
}

impl TickBuffer {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn push(&mut self, point: PricePoint) {
        self.points.push(point);
    }

    /// Most recent observation, the provisional price of the forming bar
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Keep only the most recent observation
    pub fn retain_latest(&mut self) {
        if self.points.len() > 1 {
            let keep = self.points.len() - 1;
            self.points.drain(..keep);
        }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
