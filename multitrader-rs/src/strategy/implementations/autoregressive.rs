//! Autoregressive forecast: ARIMA(p, d, 0) refitted on every bar

use crate::error::TradingError;
use crate::features::{FeatureSpec, FeatureVector};
use crate::strategy::{Direction, SignalProducer};
use crate::Result;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Autoregressive {
    name: String,
    p: usize,
    d: usize,
    window: usize,
}

impl Autoregressive {
    pub fn new(name: impl Into<String>, p: usize, d: usize, window: usize) -> Result<Self> {
        if p == 0 {
            return Err(TradingError::config("autoregressive order p must be at least 1").into());
        }
        // enough observations for more rows than parameters
        let min_window = d + 2 * p + 2;
        if window < min_window {
            return Err(TradingError::config(format!(
                "autoregressive window must be at least {} for p={} d={}",
                min_window, p, d
            ))
            .into());
        }
        Ok(Self {
            name: name.into(),
            p,
            d,
            window,
        })
    }

    /// One-step price forecast, `None` when the fit is degenerate
    pub fn forecast(&self, prices: &[f64]) -> Option<f64> {
        // levels[j] is the series differenced j times
        let mut levels = vec![prices.to_vec()];
        for j in 0..self.d {
            let next: Vec<f64> = levels[j].windows(2).map(|w| w[1] - w[0]).collect();
            levels.push(next);
        }
        let series = &levels[self.d];
        let coefficients = fit_ar(series, self.p, self.d == 0)?;

        let intercept = if self.d == 0 { coefficients[0] } else { 0.0 };
        let lags = if self.d == 0 { &coefficients[1..] } else { &coefficients[..] };
        let n = series.len();
        let mut forecast = intercept;
        for (i, phi) in lags.iter().enumerate() {
            forecast += phi * series[n - 1 - i];
        }

        // integrate back to a price
        for level in levels[..self.d].iter().rev() {
            forecast += level.last().copied()?;
        }
        forecast.is_finite().then_some(forecast)
    }
}

/// Least-squares AR(p) fit; coefficients are `[c, phi_1..phi_p]` with an
/// intercept, `[phi_1..phi_p]` without
fn fit_ar(series: &[f64], p: usize, intercept: bool) -> Option<Vec<f64>> {
    let k = p + usize::from(intercept);
    if series.len() <= p + k {
        return None;
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    let mut row = vec![0.0; k];
    for t in p..series.len() {
        let offset = usize::from(intercept);
        if intercept {
            row[0] = 1.0;
        }
        for i in 0..p {
            row[offset + i] = series[t - 1 - i];
        }
        for a in 0..k {
            xty[a] += row[a] * series[t];
            for b in 0..k {
                xtx[a][b] += row[a] * row[b];
            }
        }
    }
    solve(xtx, xty)
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = a
        .iter()
        .enumerate()
        .map(|(i, r)| r[i].abs())
        .fold(0.0, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let tolerance = scale * 1e-12;

    for col in 0..n {
        let pivot = (col..n).max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))?;
        if a[pivot][col].abs() <= tolerance {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for r in col + 1..n {
            let factor = a[r][col] / a[col][col];
            for c in col..n {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let tail: f64 = (r + 1..n).map(|c| a[r][c] * x[c]).sum();
        x[r] = (b[r] - tail) / a[r][r];
    }
    Some(x)
}

impl SignalProducer for Autoregressive {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_features(&self) -> Vec<FeatureSpec> {
        vec![FeatureSpec::Price]
    }

    fn price_window(&self) -> usize {
        self.window
    }

    fn predict(&self, features: &FeatureVector) -> Result<Direction> {
        let prices = &features.recent_prices;
        if prices.len() < self.window {
            return Err(TradingError::Producer {
                strategy: self.name.clone(),
                reason: format!("{} trailing prices, {} required", prices.len(), self.window),
            }
            .into());
        }
        let prices = &prices[prices.len() - self.window..];
        let last = features.price;
        match self.forecast(prices) {
            Some(forecast) => Ok(Direction::from_sign(forecast - last)),
            None => {
                debug!("{}: degenerate fit, no forecast", self.name);
                Ok(Direction::Flat)
            }
        }
    }
}
