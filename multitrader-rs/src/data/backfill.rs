//! Market data collaborator and the backfill bootstrap

use crate::config::{BackfillSettings, BarLength};
use crate::data::{resample_last, Bar, PricePoint, Tick};
use crate::error::TradingError;
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Market data collaborator
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Ordered price series of `instrument` between `start` and `end`
    async fn get_history(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: &str,
    ) -> Result<Vec<PricePoint>>;

    /// Live tick stream; the stream ends when the receiver is dropped or the
    /// connection closes
    async fn stream_ticks(&self, instrument: &str) -> Result<mpsc::Receiver<Tick>>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Resample a fetched series into complete bars: last price per bucket,
/// empty buckets dropped, the still-forming last bucket dropped
pub fn resample_backfill(points: &[PricePoint], bar_length: BarLength) -> Result<Vec<Bar>> {
    let mut bars: Vec<Bar> = resample_last(points, bar_length)?
        .into_iter()
        .filter_map(|(label, price)| price.map(|price| Bar::new(label, price)))
        .collect();
    bars.pop();
    Ok(bars)
}

/// Fetch the trailing window until its last bar is fresher than one bar length
pub async fn load_recent_bars(
    market: &dyn MarketData,
    clock: &dyn Clock,
    instrument: &str,
    bar_length: BarLength,
    settings: &BackfillSettings,
) -> Result<Vec<Bar>> {
    let window = Duration::try_days(settings.days).ok_or_else(|| {
        TradingError::config(format!("backfill window of {} days is out of range", settings.days))
    })?;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let now = clock.now();
        let start = now
            .checked_sub_signed(window)
            .ok_or_else(|| TradingError::config(format!("backfill window of {} days is out of range", settings.days)))?;
        let points = market
            .get_history(instrument, start, now, &settings.granularity)
            .await
            .with_context(|| format!("failed to fetch history for {}", instrument))?;
        let bars = resample_backfill(&points, bar_length)
            .with_context(|| format!("history of {} is not usable", instrument))?;
        let latest = bars.last().map(|bar| bar.timestamp);

        if let Some(last) = latest {
            if now - last < bar_length.as_duration() {
                info!(
                    "Backfilled {} {} bars of {}, last bar at {}",
                    bars.len(),
                    bar_length,
                    instrument,
                    last
                );
                return Ok(bars);
            }
        }

        if settings.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(TradingError::StaleBackfill { attempts, latest }.into());
        }
        warn!(
            "Stale backfill for {} (attempt {}, last bar {:?}), retrying in {}s",
            instrument, attempts, latest, settings.retry_delay_secs
        );
        tokio::time::sleep(settings.retry_delay()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_153_600 + secs, 0).unwrap()
    }

    /// Returns a series ending `lag_secs` before `now` and advances the clock
    struct LaggingMarket {
        lags: Mutex<Vec<i64>>,
        now: DateTime<Utc>,
    }

    #[async_trait]
    impl MarketData for LaggingMarket {
        async fn get_history(
            &self,
            _instrument: &str,
            _start: DateTime<Utc>,
            end: DateTime<Utc>,
            _granularity: &str,
        ) -> Result<Vec<PricePoint>> {
            let lag = self.lags.lock().unwrap().remove(0);
            let last = end - Duration::seconds(lag);
            Ok((0..120)
                .rev()
                .map(|i| PricePoint::new(last - Duration::seconds(5 * i), 1.0 + i as f64 * 0.001))
                .collect())
        }

        async fn stream_ticks(&self, _instrument: &str) -> Result<mpsc::Receiver<Tick>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn settings(max_attempts: Option<u32>) -> BackfillSettings {
        BackfillSettings {
            days: 1,
            granularity: "S5".to_string(),
            retry_delay_secs: 0,
            max_attempts,
        }
    }

    #[test]
    fn test_resample_backfill_drops_gaps_and_forming_bar() {
        let minute: BarLength = "1min".parse().unwrap();
        let points = vec![
            PricePoint::new(ts(10), 1.0),
            PricePoint::new(ts(55), 1.1),
            PricePoint::new(ts(190), 1.2),
            PricePoint::new(ts(250), 1.3),
        ];
        let bars = resample_backfill(&points, minute).unwrap();
        assert_eq!(bars, vec![Bar::new(ts(60), 1.1), Bar::new(ts(240), 1.2)]);
    }

    #[test]
    fn test_resample_backfill_rejects_unordered_series() {
        let minute: BarLength = "1min".parse().unwrap();
        let points = vec![
            PricePoint::new(ts(3_600), 1.0),
            PricePoint::new(ts(10), 1.1),
            PricePoint::new(ts(20), 1.2),
        ];
        let err = resample_backfill(&points, minute).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TradingError>(),
            Some(TradingError::OutOfOrderPoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_window_fails_before_fetching() {
        let market = LaggingMarket {
            lags: Mutex::new(vec![0]),
            now: ts(3_600),
        };
        let minute: BarLength = "1min".parse().unwrap();
        let mut settings = settings(Some(1));
        settings.days = i64::MAX;
        let err = load_recent_bars(&market, &FixedClock(market.now), "EUR_USD", minute, &settings)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<TradingError>(), Some(TradingError::Config(_))));
        assert_eq!(market.lags.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_fresh() {
        let now = ts(3_600 + 30);
        let market = LaggingMarket {
            lags: Mutex::new(vec![600, 300, 0]),
            now,
        };
        let minute: BarLength = "1min".parse().unwrap();
        let bars = load_recent_bars(&market, &FixedClock(market.now), "EUR_USD", minute, &settings(None))
            .await
            .unwrap();
        assert!(market.lags.lock().unwrap().is_empty());
        assert_eq!(bars.last().unwrap().timestamp, ts(3_600));
    }

    #[tokio::test]
    async fn test_persistent_staleness_is_reported() {
        let market = LaggingMarket {
            lags: Mutex::new(vec![600, 600, 600]),
            now: ts(3_600),
        };
        let minute: BarLength = "1min".parse().unwrap();
        let err = load_recent_bars(&market, &FixedClock(market.now), "EUR_USD", minute, &settings(Some(2)))
            .await
            .unwrap_err();
        match err.downcast_ref::<TradingError>() {
            Some(TradingError::StaleBackfill { attempts, latest }) => {
                assert_eq!(*attempts, 2);
                assert!(latest.is_some());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(market.lags.lock().unwrap().len(), 1);
    }
}
