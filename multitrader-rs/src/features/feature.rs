//! Feature catalogue
//!
//! Features are addressed by name (`sma_20`, `boll_50_lag_3`, ...). Return-based
//! features use log returns, rolling deviations are sample deviations.

use crate::error::TradingError;
use crate::Result;
use std::fmt;
use std::str::FromStr;

/// One named feature
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureSpec {
    /// `price`
    Price,
    /// `returns`: log return against the previous row
    Returns,
    /// `dir`: +1 when the return is positive, else -1
    Direction,
    /// `sma_{w}`
    Mean(usize),
    /// `std_{w}`
    Std(usize),
    /// `spread_{s}_{l}`: `sma_s - sma_l`
    Spread(usize, usize),
    /// `boll_{w}`: `(price - sma_w) / std_w`
    ZScore(usize),
    /// `min_{w}`: rolling minimum over price, minus one
    MinRatio(usize),
    /// `max_{w}`: rolling maximum over price, minus one
    MaxRatio(usize),
    /// `mom_{w}`: rolling mean of log returns
    Momentum(usize),
    /// `vol_{w}`: rolling deviation of log returns
    Volatility(usize),
    /// `{feature}_lag_{k}`
    Lag(Box<FeatureSpec>, usize),
}

impl FeatureSpec {
    pub fn lag(self, k: usize) -> Self {
        FeatureSpec::Lag(Box::new(self), k)
    }

    /// Reject windows that can never be filled
    pub fn validate(&self) -> Result<()> {
        let invalid = match self {
            FeatureSpec::Price | FeatureSpec::Returns | FeatureSpec::Direction => false,
            FeatureSpec::Mean(w)
            | FeatureSpec::MinRatio(w)
            | FeatureSpec::MaxRatio(w)
            | FeatureSpec::Momentum(w) => *w == 0,
            FeatureSpec::Std(w) | FeatureSpec::ZScore(w) | FeatureSpec::Volatility(w) => *w < 2,
            FeatureSpec::Spread(s, l) => *s == 0 || *l == 0,
            FeatureSpec::Lag(inner, k) => return if *k == 0 {
                Err(TradingError::config(format!("lag of `{}` must be at least 1", self)).into())
            } else {
                inner.validate()
            },
        };
        if invalid {
            return Err(TradingError::config(format!("invalid window in feature `{}`", self)).into());
        }
        Ok(())
    }

    /// Number of trailing prices needed to define the feature on the last row
    pub fn lookback(&self) -> usize {
        match self {
            FeatureSpec::Price => 1,
            FeatureSpec::Returns | FeatureSpec::Direction => 2,
            FeatureSpec::Mean(w)
            | FeatureSpec::Std(w)
            | FeatureSpec::ZScore(w)
            | FeatureSpec::MinRatio(w)
            | FeatureSpec::MaxRatio(w) => *w,
            FeatureSpec::Spread(s, l) => (*s).max(*l),
            FeatureSpec::Momentum(w) | FeatureSpec::Volatility(w) => w + 1,
            FeatureSpec::Lag(inner, k) => inner.lookback() + k,
        }
    }
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSpec::Price => write!(f, "price"),
            FeatureSpec::Returns => write!(f, "returns"),
            FeatureSpec::Direction => write!(f, "dir"),
            FeatureSpec::Mean(w) => write!(f, "sma_{}", w),
            FeatureSpec::Std(w) => write!(f, "std_{}", w),
            FeatureSpec::Spread(s, l) => write!(f, "spread_{}_{}", s, l),
            FeatureSpec::ZScore(w) => write!(f, "boll_{}", w),
            FeatureSpec::MinRatio(w) => write!(f, "min_{}", w),
            FeatureSpec::MaxRatio(w) => write!(f, "max_{}", w),
            FeatureSpec::Momentum(w) => write!(f, "mom_{}", w),
            FeatureSpec::Volatility(w) => write!(f, "vol_{}", w),
            FeatureSpec::Lag(inner, k) => write!(f, "{}_lag_{}", inner, k),
        }
    }
}

impl FromStr for FeatureSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || TradingError::config(format!("unknown feature `{}`", s));

        if let Some((inner, k)) = s.rsplit_once("_lag_") {
            let k = k.parse().map_err(|_| unknown())?;
            return Ok(inner.parse::<FeatureSpec>()?.lag(k));
        }

        let mut parts = s.split('_');
        let head = parts.next().unwrap_or_default();
        let args = parts
            .map(|p| p.parse::<usize>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| unknown())?;

        let spec = match (head, args.as_slice()) {
            ("price", []) => FeatureSpec::Price,
            ("returns", []) => FeatureSpec::Returns,
            ("dir", []) => FeatureSpec::Direction,
            ("sma", [w]) => FeatureSpec::Mean(*w),
            ("std", [w]) => FeatureSpec::Std(*w),
            ("spread", [s, l]) => FeatureSpec::Spread(*s, *l),
            ("boll", [w]) => FeatureSpec::ZScore(*w),
            ("min", [w]) => FeatureSpec::MinRatio(*w),
            ("max", [w]) => FeatureSpec::MaxRatio(*w),
            ("mom", [w]) => FeatureSpec::Momentum(*w),
            ("vol", [w]) => FeatureSpec::Volatility(*w),
            _ => return Err(unknown().into()),
        };
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for name in [
            "price",
            "returns",
            "dir",
            "sma_50",
            "std_20",
            "spread_50_150",
            "boll_50",
            "min_50",
            "max_50",
            "mom_3",
            "vol_50",
            "dir_lag_5",
            "sma_20_lag_1",
        ] {
            let spec: FeatureSpec = name.parse().unwrap();
            assert_eq!(spec.to_string(), name);
        }
    }

    #[test]
    fn test_lag_parsing() {
        let spec: FeatureSpec = "boll_50_lag_3".parse().unwrap();
        assert_eq!(spec, FeatureSpec::ZScore(50).lag(3));
        assert_eq!(spec.lookback(), 53);
    }

    #[test]
    fn test_rejects_unknown_or_invalid() {
        assert!("ema_20".parse::<FeatureSpec>().is_err());
        assert!("sma_x".parse::<FeatureSpec>().is_err());
        assert!("sma".parse::<FeatureSpec>().is_err());
        assert!(FeatureSpec::Std(1).validate().is_err());
        assert!(FeatureSpec::Mean(0).validate().is_err());
        assert!(FeatureSpec::Price.lag(0).validate().is_err());
        assert!(FeatureSpec::Volatility(2).lag(1).validate().is_ok());
    }
}
