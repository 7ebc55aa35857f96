//! Feature engine

use crate::data::{Bar, BarHistory, PricePoint, TickBuffer};
use crate::error::TradingError;
use crate::features::FeatureSpec;
use crate::indicators::{rolling_max, rolling_mean, rolling_min, rolling_std};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Deviations at or below this are treated as zero
const MIN_DEVIATION: f64 = 1e-12;

/// Features of one row
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Row timestamp (bar close, or the provisional tick)
    pub timestamp: DateTime<Utc>,
    /// Price of the row
    pub price: f64,
    /// Feature values by name
    pub values: BTreeMap<String, f64>,
    /// Trailing prices ending at this row, oldest first
    pub recent_prices: Vec<f64>,
}

impl FeatureVector {
    pub fn get(&self, spec: &FeatureSpec) -> Result<f64> {
        self.get_named(&spec.to_string())
    }

    pub fn get_named(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| TradingError::MissingFeature(name.to_string()).into())
    }
}

/// Computes the union of the features every producer needs
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    specs: BTreeSet<FeatureSpec>,
    price_window: usize,
}

impl FeatureEngine {
    /// `price_window` trailing prices are attached to every row and required
    /// for a row to be defined
    pub fn new(specs: impl IntoIterator<Item = FeatureSpec>, price_window: usize) -> Result<Self> {
        let specs: BTreeSet<FeatureSpec> = specs.into_iter().collect();
        for spec in &specs {
            spec.validate()?;
        }
        Ok(Self { specs, price_window })
    }

    pub fn specs(&self) -> &BTreeSet<FeatureSpec> {
        &self.specs
    }

    pub fn price_window(&self) -> usize {
        self.price_window
    }

    /// Trailing prices needed to define the last row
    pub fn lookback(&self) -> usize {
        self.specs
            .iter()
            .map(FeatureSpec::lookback)
            .chain(std::iter::once(self.price_window))
            .max()
            .unwrap_or(1)
            .max(1)
    }

    /// Features of the forming bar: closed history plus the latest tick as a
    /// provisional row. `None` while the windows are not full.
    pub fn compute(&self, history: &BarHistory, buffer: &TickBuffer) -> Result<Option<FeatureVector>> {
        let bars = history.bars();
        let provisional = buffer.latest().copied();
        let needed = self.lookback() + 1;
        let keep = needed.saturating_sub(usize::from(provisional.is_some()));
        let tail = &bars[bars.len().saturating_sub(keep)..];
        let rows = self.rows(tail, provisional)?;
        Ok(rows.into_iter().last().flatten())
    }

    /// Features of the newest closed bar, `None` while the windows are not full
    pub fn compute_closed(&self, history: &BarHistory) -> Result<Option<FeatureVector>> {
        let bars = history.bars();
        let tail = &bars[bars.len().saturating_sub(self.lookback() + 1)..];
        let rows = self.rows(tail, None)?;
        Ok(rows.into_iter().last().flatten())
    }

    /// Every defined row over the bars, optionally followed by a provisional row
    pub fn compute_frame(&self, bars: &[Bar], provisional: Option<PricePoint>) -> Result<Vec<FeatureVector>> {
        Ok(self.rows(bars, provisional)?.into_iter().flatten().collect())
    }

    fn rows(&self, bars: &[Bar], provisional: Option<PricePoint>) -> Result<Vec<Option<FeatureVector>>> {
        let points: Vec<PricePoint> = bars
            .iter()
            .map(|bar| PricePoint::new(bar.timestamp, bar.price))
            .chain(provisional)
            .collect();
        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();

        let mut columns = Columns::new(&prices);
        let mut computed = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            computed.push((spec.to_string(), columns.get(spec)?));
        }

        let rows = points
            .iter()
            .enumerate()
            .map(|(t, point)| {
                if t + 1 < self.price_window {
                    return None;
                }
                let mut values = BTreeMap::new();
                for (name, column) in &computed {
                    values.insert(name.clone(), column[t]?);
                }
                Some(FeatureVector {
                    timestamp: point.timestamp,
                    price: point.price,
                    values,
                    recent_prices: prices[t + 1 - self.price_window..=t].to_vec(),
                })
            })
            .collect();
        Ok(rows)
    }
}

/// Memoized feature columns over one price series
struct Columns<'a> {
    prices: &'a [f64],
    cache: BTreeMap<FeatureSpec, Vec<Option<f64>>>,
}

impl<'a> Columns<'a> {
    fn new(prices: &'a [f64]) -> Self {
        Self {
            prices,
            cache: BTreeMap::new(),
        }
    }

    fn get(&mut self, spec: &FeatureSpec) -> Result<Vec<Option<f64>>> {
        if let Some(column) = self.cache.get(spec) {
            return Ok(column.clone());
        }
        let column = self.build(spec)?;
        self.cache.insert(spec.clone(), column.clone());
        Ok(column)
    }

    fn build(&mut self, spec: &FeatureSpec) -> Result<Vec<Option<f64>>> {
        let column = match spec {
            FeatureSpec::Price => self.prices.iter().copied().map(Some).collect(),
            FeatureSpec::Returns => std::iter::once(None)
                .chain(self.prices.windows(2).map(|w| {
                    let r = (w[1] / w[0]).ln();
                    r.is_finite().then_some(r)
                }))
                .collect(),
            FeatureSpec::Direction => self
                .get(&FeatureSpec::Returns)?
                .into_iter()
                .map(|r| r.map(|r| if r > 0.0 { 1.0 } else { -1.0 }))
                .collect(),
            FeatureSpec::Mean(w) => rolling_mean(&self.get(&FeatureSpec::Price)?, *w)?,
            FeatureSpec::Std(w) => rolling_std(&self.get(&FeatureSpec::Price)?, *w)?,
            FeatureSpec::Spread(s, l) => zip_with(
                &self.get(&FeatureSpec::Mean(*s))?,
                &self.get(&FeatureSpec::Mean(*l))?,
                |a, b| Some(a - b),
            ),
            FeatureSpec::ZScore(w) => {
                let centered = zip_with(
                    &self.get(&FeatureSpec::Price)?,
                    &self.get(&FeatureSpec::Mean(*w))?,
                    |p, m| Some(p - m),
                );
                zip_with(&centered, &self.get(&FeatureSpec::Std(*w))?, |d, s| {
                    (s > MIN_DEVIATION).then(|| d / s)
                })
            }
            FeatureSpec::MinRatio(w) => zip_with(
                &rolling_min(&self.get(&FeatureSpec::Price)?, *w)?,
                &self.get(&FeatureSpec::Price)?,
                |m, p| Some(m / p - 1.0),
            ),
            FeatureSpec::MaxRatio(w) => zip_with(
                &rolling_max(&self.get(&FeatureSpec::Price)?, *w)?,
                &self.get(&FeatureSpec::Price)?,
                |m, p| Some(m / p - 1.0),
            ),
            FeatureSpec::Momentum(w) => rolling_mean(&self.get(&FeatureSpec::Returns)?, *w)?,
            FeatureSpec::Volatility(w) => rolling_std(&self.get(&FeatureSpec::Returns)?, *w)?,
            FeatureSpec::Lag(inner, k) => {
                let base = self.get(inner)?;
                let k = (*k).min(base.len());
                std::iter::repeat(None)
                    .take(k)
                    .chain(base[..base.len() - k].iter().copied())
                    .collect()
            }
        };
        Ok(column)
    }
}

fn zip_with(
    a: &[Option<f64>],
    b: &[Option<f64>],
    f: impl Fn(f64, f64) -> Option<f64>,
) -> Vec<Option<f64>> {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => f(*x, *y).filter(|v| v.is_finite()),
            _ => None,
        })
        .collect()
}
