//! Order-execution collaborator

use crate::data::Tick;
use crate::Result;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Confirmed fill of a market order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub time: DateTime<Utc>,
    /// Signed units filled
    pub units: i64,
    pub price: f64,
    /// Realized profit/loss of this fill
    pub realized_pnl: f64,
}

/// Broker gateway
#[async_trait]
pub trait Broker: Send + Sync {
    /// Place a market order for signed `units`; returns only once the fill is
    /// confirmed. `suppress_confirmation` disables any interactive prompt.
    async fn create_order(&self, instrument: &str, units: i64, suppress_confirmation: bool) -> Result<OrderFill>;

    /// Observe a live tick
    fn observe(&self, _tick: &Tick) {}
}

#[derive(Debug, Default)]
struct PaperBook {
    mark: Option<(DateTime<Utc>, f64)>,
    units: i64,
    avg_price: f64,
}

/// Simulated broker filling at the latest mark price
///
/// Realized P&L uses average-price accounting: adding to a position moves the
/// average, reducing or flipping realizes P&L on the closed units.
#[derive(Debug, Default)]
pub struct PaperBroker {
    book: Mutex<PaperBook>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fill price
    pub fn mark(&self, time: DateTime<Utc>, price: f64) {
        if let Ok(mut book) = self.book.lock() {
            book.mark = Some((time, price));
        }
    }

    /// Net units held
    pub fn units(&self) -> i64 {
        self.book.lock().map(|book| book.units).unwrap_or_default()
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn create_order(&self, instrument: &str, units: i64, _suppress_confirmation: bool) -> Result<OrderFill> {
        let mut book = self.book.lock().map_err(|_| anyhow!("paper book poisoned"))?;
        let (time, price) = book
            .mark
            .ok_or_else(|| anyhow!("no mark price for {}", instrument))?;
        if units == 0 {
            return Err(anyhow!("zero-unit order for {}", instrument));
        }

        let held = book.units;
        let mut realized = 0.0;
        if held == 0 || held.signum() == units.signum() {
            let size = (held.abs() + units.abs()) as f64;
            book.avg_price = (book.avg_price * held.abs() as f64 + price * units.abs() as f64) / size;
        } else {
            let closed = held.abs().min(units.abs()) as f64;
            realized = closed * (price - book.avg_price) * held.signum() as f64;
            let remaining = held + units;
            if remaining == 0 {
                book.avg_price = 0.0;
            } else if remaining.signum() != held.signum() {
                book.avg_price = price;
            }
        }
        book.units = held + units;

        Ok(OrderFill {
            time,
            units,
            price,
            realized_pnl: realized,
        })
    }

    fn observe(&self, tick: &Tick) {
        self.mark(tick.timestamp, tick.mid());
    }
}
