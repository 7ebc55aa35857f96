//! Tick-to-bar aggregation

use crate::config::BarLength;
use crate::data::{bucket_close, bucket_open, Bar, BarHistory, PricePoint, Tick, TickBuffer};
use crate::error::TradingError;
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Resample ordered observations into contiguous right-labelled buckets,
/// keeping the last observed price of each bucket (`None` for empty buckets)
///
/// Fails with `TradingError::OutOfOrderPoint` when a timestamp goes backwards.
pub fn resample_last(points: &[PricePoint], bar_length: BarLength) -> Result<Vec<(DateTime<Utc>, Option<f64>)>> {
    if let Some(pair) = points.windows(2).find(|pair| pair[1].timestamp < pair[0].timestamp) {
        return Err(TradingError::OutOfOrderPoint {
            previous: pair[0].timestamp,
            next: pair[1].timestamp,
        }
        .into());
    }
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Ok(Vec::new());
    };
    let step = bar_length.as_duration();
    let first_label = bucket_close(first.timestamp, bar_length);
    let last_label = bucket_close(last.timestamp, bar_length);
    let count = ((last_label - first_label).num_milliseconds() / bar_length.as_millis()) as usize + 1;

    let mut values = vec![None; count];
    for point in points {
        let label = bucket_close(point.timestamp, bar_length);
        let idx = ((label - first_label).num_milliseconds() / bar_length.as_millis()) as usize;
        if let Some(slot) = values.get_mut(idx) {
            *slot = Some(point.price);
        }
    }

    Ok(values
        .into_iter()
        .enumerate()
        .map(|(i, value)| (first_label + step * i as i32, value))
        .collect())
}

/// Folds ticks into fixed-length bars
///
/// Owns the bar history and the tick buffer. A bar closes once a tick arrives
/// more than one bar length after the last bar boundary; every complete bucket
/// of the buffer is then queued, interior gaps forward-filled, and the queue is
/// drained one bar per `ingest` call.
#[derive(Debug)]
pub struct BarAggregator {
    bar_length: BarLength,
    history: BarHistory,
    buffer: TickBuffer,
    backlog: VecDeque<Bar>,
    /// Label of the last resampled bucket
    last_bar: Option<DateTime<Utc>>,
}

impl BarAggregator {
    pub fn new(bar_length: BarLength) -> Self {
        Self {
            bar_length,
            history: BarHistory::new(),
            buffer: TickBuffer::new(),
            backlog: VecDeque::new(),
            last_bar: None,
        }
    }

    /// Replace the bar history with backfilled bars
    pub fn seed(&mut self, bars: Vec<Bar>) -> Result<()> {
        self.history = BarHistory::from_bars(bars)?;
        self.last_bar = self.history.last().map(|bar| bar.timestamp);
        self.buffer = TickBuffer::new();
        self.backlog.clear();
        info!(
            "Seeded {} bars, last bar at {:?}",
            self.history.len(),
            self.last_bar
        );
        Ok(())
    }

    /// Add one tick; returns the bar closed by this call, if any
    pub fn ingest(&mut self, tick: Tick) -> Result<Option<Bar>> {
        if !tick.is_valid() {
            warn!("Ignoring invalid tick at {}: bid={} ask={}", tick.timestamp, tick.bid, tick.ask);
            return self.emit();
        }
        if let Some(latest) = self.buffer.latest() {
            if tick.timestamp < latest.timestamp {
                warn!(
                    "Ignoring out-of-order tick at {} (latest {})",
                    tick.timestamp, latest.timestamp
                );
                return self.emit();
            }
        }

        let last_bar = *self
            .last_bar
            .get_or_insert_with(|| bucket_open(tick.timestamp, self.bar_length));
        if tick.timestamp < last_bar {
            warn!("Ignoring tick at {} inside closed bar {}", tick.timestamp, last_bar);
            return self.emit();
        }

        self.buffer.push(PricePoint::from(tick));

        if tick.timestamp - last_bar > self.bar_length.as_duration() {
            self.close_buckets(last_bar, tick.timestamp)?;
        }

        self.emit()
    }

    fn close_buckets(&mut self, last_bar: DateTime<Utc>, newest: DateTime<Utc>) -> Result<()> {
        let newest_label = bucket_close(newest, self.bar_length);
        let mut carried = None;
        let mut queued = 0;
        for (label, value) in resample_last(self.buffer.points(), self.bar_length)? {
            if label >= newest_label {
                break;
            }
            carried = value.or(carried);
            if label <= last_bar {
                continue;
            }
            if let Some(price) = carried {
                self.backlog.push_back(Bar::new(label, price));
                self.last_bar = Some(label);
                queued += 1;
            }
        }
        if queued > 1 {
            debug!("{} bars queued behind a gap, draining one per tick", queued);
        }
        self.buffer.retain_latest();
        Ok(())
    }

    fn emit(&mut self) -> Result<Option<Bar>> {
        let Some(bar) = self.backlog.pop_front() else {
            return Ok(None);
        };
        self.history.push(bar)?;
        Ok(Some(bar))
    }

    pub fn bar_length(&self) -> BarLength {
        self.bar_length
    }

    pub fn history(&self) -> &BarHistory {
        &self.history
    }

    pub fn buffer(&self) -> &TickBuffer {
        &self.buffer
    }

    /// Bars resampled but not yet emitted
    pub fn pending(&self) -> usize {
        self.backlog.len()
    }

    pub fn last_bar(&self) -> Option<DateTime<Utc>> {
        self.last_bar
    }
}
