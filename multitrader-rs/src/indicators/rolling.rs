//! Rolling window statistics
//!
//! Series may contain undefined entries (`None`); a window is only defined once
//! it holds `period` consecutive defined values.

use crate::indicators::Indicator;
use crate::Result;
use anyhow::anyhow;
use ta::indicators::{Maximum, Minimum, SimpleMovingAverage, StandardDeviation};
use ta::Next;

/// Statistic computed over a rolling window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingStat {
    Mean,
    /// Sample standard deviation (n - 1)
    Std,
    Min,
    Max,
}

#[derive(Debug, Clone)]
enum Inner {
    Mean(SimpleMovingAverage),
    Std(StandardDeviation),
    Min(Minimum),
    Max(Maximum),
}

impl Inner {
    fn new(stat: RollingStat, period: usize) -> Result<Self> {
        let inner = match stat {
            RollingStat::Mean => SimpleMovingAverage::new(period).map(Inner::Mean),
            RollingStat::Std => StandardDeviation::new(period).map(Inner::Std),
            RollingStat::Min => Minimum::new(period).map(Inner::Min),
            RollingStat::Max => Maximum::new(period).map(Inner::Max),
        };
        inner.map_err(|e| anyhow!("invalid {:?} window of {}: {:?}", stat, period, e))
    }

    fn next(&mut self, value: f64) -> f64 {
        match self {
            Inner::Mean(ind) => ind.next(value),
            Inner::Std(ind) => ind.next(value),
            Inner::Min(ind) => ind.next(value),
            Inner::Max(ind) => ind.next(value),
        }
    }
}

/// Rolling window indicator over a `ta` indicator
#[derive(Debug, Clone)]
pub struct RollingWindow {
    stat: RollingStat,
    period: usize,
    inner: Inner,
    update_count: usize,
    last_value: Option<f64>,
}

impl RollingWindow {
    pub fn new(stat: RollingStat, period: usize) -> Result<Self> {
        if period == 0 || (stat == RollingStat::Std && period < 2) {
            return Err(anyhow!("invalid {:?} window of {}", stat, period));
        }
        Ok(Self {
            stat,
            period,
            inner: Inner::new(stat, period)?,
            update_count: 0,
            last_value: None,
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feed the next entry of a series that may contain gaps
    pub fn update_opt(&mut self, value: Option<f64>) -> Option<f64> {
        match value {
            Some(v) if v.is_finite() => self.update(v),
            _ => self.reset(),
        }
        self.last_value
    }

    fn reset(&mut self) {
        if self.update_count > 0 {
            if let Ok(inner) = Inner::new(self.stat, self.period) {
                self.inner = inner;
            }
        }
        self.update_count = 0;
        self.last_value = None;
    }
}

impl Indicator for RollingWindow {
    fn name(&self) -> &str {
        match self.stat {
            RollingStat::Mean => "SMA",
            RollingStat::Std => "STD",
            RollingStat::Min => "MIN",
            RollingStat::Max => "MAX",
        }
    }

    fn update(&mut self, value: f64) {
        let raw = self.inner.next(value);
        self.update_count += 1;
        self.last_value = if self.update_count >= self.period {
            Some(match self.stat {
                // ta reports the population deviation
                RollingStat::Std => {
                    let n = self.period as f64;
                    raw * (n / (n - 1.0)).sqrt()
                }
                _ => raw,
            })
        } else {
            None
        };
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        self.update_count >= self.period
    }
}

/// Apply a rolling statistic over a series
pub fn rolling(values: &[Option<f64>], period: usize, stat: RollingStat) -> Result<Vec<Option<f64>>> {
    let mut window = RollingWindow::new(stat, period)?;
    Ok(values.iter().map(|&v| window.update_opt(v)).collect())
}

pub fn rolling_mean(values: &[Option<f64>], period: usize) -> Result<Vec<Option<f64>>> {
    rolling(values, period, RollingStat::Mean)
}

pub fn rolling_std(values: &[Option<f64>], period: usize) -> Result<Vec<Option<f64>>> {
    rolling(values, period, RollingStat::Std)
}

pub fn rolling_min(values: &[Option<f64>], period: usize) -> Result<Vec<Option<f64>>> {
    rolling(values, period, RollingStat::Min)
}

pub fn rolling_max(values: &[Option<f64>], period: usize) -> Result<Vec<Option<f64>>> {
    rolling(values, period, RollingStat::Max)
}
