//! Trading session
//!
//! Owns every piece of mutable state of one instrument and runs one complete
//! decision cycle per closed bar: features, opinions, target, order.

use crate::config::{BackfillSettings, SessionConfig};
use crate::data::{load_recent_bars, Bar, BarAggregator, BarHistory, Clock, MarketData, Tick};
use crate::execution::{Broker, Ledger, TradeExecutor, TradeRecord};
use crate::features::{FeatureEngine, FeatureSpec};
use crate::strategy::{Direction, ProducerRegistry, SignalCombiner, SignalProducer};
use crate::Result;
use anyhow::Context;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Outcome of one closed bar
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub bar: Bar,
    /// Opinions by strategy, empty when no decision was taken
    pub opinions: BTreeMap<String, Direction>,
    /// Combined target, `None` while history is insufficient or newer bars
    /// are still queued
    pub target: Option<Direction>,
    /// Order executed for this bar
    pub trade: Option<TradeRecord>,
}

/// Final state of a finished session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub ticks_seen: u64,
    pub bars_closed: u64,
    /// Trades executed during the session
    pub trade_count: u64,
    /// Most recent trades, oldest first
    pub trades: Vec<TradeRecord>,
    pub cumulative_pnl: f64,
    pub position: Direction,
}

pub struct TradingSession {
    instrument: String,
    backfill: BackfillSettings,
    max_ticks: Option<u64>,
    aggregator: BarAggregator,
    features: FeatureEngine,
    producers: Vec<Box<dyn SignalProducer>>,
    combiner: SignalCombiner,
    executor: TradeExecutor,
    ticks_seen: u64,
    bars_closed: u64,
}

impl TradingSession {
    pub fn new(
        config: &SessionConfig,
        registry: &ProducerRegistry,
        broker: Arc<dyn Broker>,
        ledger: Arc<dyn Ledger>,
    ) -> Result<Self> {
        config.validate()?;
        let producers = registry.create_all(config)?;
        Self::with_producers(config, producers, broker, ledger)
    }

    /// Build a session around already constructed producers
    pub fn with_producers(
        config: &SessionConfig,
        producers: Vec<Box<dyn SignalProducer>>,
        broker: Arc<dyn Broker>,
        ledger: Arc<dyn Ledger>,
    ) -> Result<Self> {
        let specs: Vec<FeatureSpec> = producers.iter().flat_map(|p| p.required_features()).collect();
        let price_window = producers.iter().map(|p| p.price_window()).max().unwrap_or(0);
        let features = FeatureEngine::new(specs, price_window)?;
        let combiner = SignalCombiner::new(
            config.combiner,
            producers.iter().map(|p| p.name().to_string()).collect(),
        )?;
        let executor = TradeExecutor::new(
            broker,
            ledger,
            config.instrument.clone(),
            config.strategy_label.clone(),
            config.units,
        );

        info!(
            "Session for {} ({} bars, {:?}): strategies [{}], {} features",
            config.instrument,
            config.bar_length,
            config.combiner,
            combiner.strategies().join(", "),
            features.specs().len()
        );

        Ok(Self {
            instrument: config.instrument.clone(),
            backfill: config.backfill.clone(),
            max_ticks: config.max_ticks,
            aggregator: BarAggregator::new(config.bar_length),
            features,
            producers,
            combiner,
            executor,
            ticks_seen: 0,
            bars_closed: 0,
        })
    }

    /// Seed the bar history from the market data backfill
    pub async fn bootstrap(&mut self, market: &dyn MarketData, clock: &dyn Clock) -> Result<()> {
        let bars = load_recent_bars(
            market,
            clock,
            &self.instrument,
            self.aggregator.bar_length(),
            &self.backfill,
        )
        .await?;
        self.seed(bars)
    }

    /// Seed the bar history and replay it through stateful producers
    pub fn seed(&mut self, bars: Vec<Bar>) -> Result<()> {
        self.aggregator.seed(bars)?;
        let rows = self
            .features
            .compute_frame(self.aggregator.history().bars(), None)?;
        for producer in &mut self.producers {
            producer
                .warm_up(&rows)
                .with_context(|| format!("failed to warm up strategy `{}`", producer.name()))?;
        }
        debug!("Warmed up producers over {} rows", rows.len());
        Ok(())
    }

    /// Feed one tick; runs a decision cycle when it closes a bar
    ///
    /// Every closed bar first advances the producers' carried state with its
    /// own row. Opinions are then taken on the provisional row of the latest
    /// tick, unless older bars are still queued behind a gap: those only
    /// advance state, and the decision waits for the newest one.
    pub async fn on_tick(&mut self, tick: Tick) -> Result<Option<CycleReport>> {
        self.ticks_seen += 1;
        self.executor.broker().observe(&tick);

        let Some(bar) = self.aggregator.ingest(tick)? else {
            return Ok(None);
        };
        self.bars_closed += 1;
        info!("Bar closed at {} | price = {}", bar.timestamp, bar.price);

        if let Some(closed) = self.features.compute_closed(self.aggregator.history())? {
            for producer in &mut self.producers {
                producer
                    .observe_closed(&closed)
                    .with_context(|| format!("strategy `{}` failed on bar {}", producer.name(), bar.timestamp))?;
            }
        }

        let no_decision = CycleReport {
            bar,
            opinions: BTreeMap::new(),
            target: None,
            trade: None,
        };
        if self.aggregator.pending() > 0 {
            debug!(
                "{} newer bars queued behind {}, no decision",
                self.aggregator.pending(),
                bar.timestamp
            );
            return Ok(Some(no_decision));
        }

        let Some(row) = self
            .features
            .compute(self.aggregator.history(), self.aggregator.buffer())?
        else {
            debug!("Insufficient history at {}, no decision", bar.timestamp);
            return Ok(Some(no_decision));
        };

        let mut opinions = BTreeMap::new();
        for producer in &self.producers {
            let opinion = producer
                .predict(&row)
                .with_context(|| format!("strategy `{}` failed at {}", producer.name(), bar.timestamp))?;
            opinions.insert(producer.name().to_string(), opinion);
        }
        let target = self.combiner.combine(&opinions)?;
        debug!("Opinions {:?} -> target {}", opinions, target);

        let trade = self.executor.rebalance(target).await?;
        Ok(Some(CycleReport {
            bar,
            opinions,
            target: Some(target),
            trade,
        }))
    }

    /// Consume ticks until the stream closes, the tick budget is spent or
    /// `stop` resolves, then shut down
    pub async fn run<S>(&mut self, mut ticks: mpsc::Receiver<Tick>, stop: S) -> Result<SessionSummary>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(stop);
        loop {
            if let Some(max) = self.max_ticks {
                if self.ticks_seen >= max {
                    info!("Tick budget of {} reached", max);
                    break;
                }
            }
            let tick = tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("Stop requested");
                    break;
                }
                tick = ticks.recv() => match tick {
                    Some(tick) => tick,
                    None => {
                        info!("Tick stream closed");
                        break;
                    }
                },
            };
            if let Err(e) = self.on_tick(tick).await {
                error!("Decision cycle skipped: {:#}", e);
            }
        }
        self.shutdown().await
    }

    /// Force the position flat and summarize the session
    pub async fn shutdown(&mut self) -> Result<SessionSummary> {
        if !self.executor.position().is_flat() {
            info!("Closing {} position before shutdown", self.executor.position());
            self.executor
                .flatten()
                .await
                .context("failed to close the position at shutdown")?;
        }
        let summary = self.summary();
        info!(
            "Session finished: {} ticks, {} bars, {} trades, cumulative P&L {}",
            summary.ticks_seen,
            summary.bars_closed,
            summary.trade_count,
            summary.cumulative_pnl
        );
        Ok(summary)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            ticks_seen: self.ticks_seen,
            bars_closed: self.bars_closed,
            trade_count: self.executor.trade_count(),
            trades: self.executor.recent_trades().iter().cloned().collect(),
            cumulative_pnl: self.executor.cumulative_pnl(),
            position: self.executor.position(),
        }
    }

    pub fn position(&self) -> Direction {
        self.executor.position()
    }

    pub fn history(&self) -> &BarHistory {
        self.aggregator.history()
    }

    pub fn feature_engine(&self) -> &FeatureEngine {
        &self.features
    }
}
