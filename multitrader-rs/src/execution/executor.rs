//! Trade executor
//!
//! Sole writer of the held position and the session P&L. The full trade
//! history belongs to the ledger; only the most recent trades are kept here.

use crate::error::TradingError;
use crate::execution::{Broker, Ledger, TradeRecord};
use crate::portfolio::{OrderPlan, PositionState};
use crate::strategy::Direction;
use crate::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Trades kept in memory by default
pub const RECENT_TRADES: usize = 512;

pub struct TradeExecutor {
    broker: Arc<dyn Broker>,
    ledger: Arc<dyn Ledger>,
    instrument: String,
    strategy: String,
    unit: i64,
    position: PositionState,
    cumulative_pnl: f64,
    trade_count: u64,
    recent: VecDeque<TradeRecord>,
    recent_limit: usize,
}

impl TradeExecutor {
    pub fn new(
        broker: Arc<dyn Broker>,
        ledger: Arc<dyn Ledger>,
        instrument: impl Into<String>,
        strategy: impl Into<String>,
        unit: i64,
    ) -> Self {
        Self {
            broker,
            ledger,
            instrument: instrument.into(),
            strategy: strategy.into(),
            unit,
            position: PositionState::new(),
            cumulative_pnl: 0.0,
            trade_count: 0,
            recent: VecDeque::new(),
            recent_limit: RECENT_TRADES,
        }
    }

    /// Keep at most `limit` recent trades in memory
    pub fn with_trade_window(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self.recent.truncate(limit);
        self
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub fn position(&self) -> Direction {
        self.position.direction()
    }

    pub fn cumulative_pnl(&self) -> f64 {
        self.cumulative_pnl
    }

    /// Trades executed since the session started
    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    /// Most recent trades, oldest first
    pub fn recent_trades(&self) -> &VecDeque<TradeRecord> {
        &self.recent
    }

    /// Move the position to `target`; `None` when already there
    pub async fn rebalance(&mut self, target: Direction) -> Result<Option<TradeRecord>> {
        match self.position.plan(target, self.unit) {
            Some(plan) => self.execute(plan).await.map(Some),
            None => Ok(None),
        }
    }

    /// Close the full held size
    pub async fn flatten(&mut self) -> Result<Option<TradeRecord>> {
        self.rebalance(Direction::Flat).await
    }

    async fn execute(&mut self, plan: OrderPlan) -> Result<TradeRecord> {
        info!("{}: sending {:+} units of {}", plan.going(), plan.units, self.instrument);
        let fill = self
            .broker
            .create_order(&self.instrument, plan.units, true)
            .await
            .map_err(|e| TradingError::OrderRejected {
                instrument: self.instrument.clone(),
                units: plan.units,
                reason: format!("{:#}", e),
            })?;

        self.position.confirm(&plan);
        self.cumulative_pnl += fill.realized_pnl;
        self.trade_count += 1;

        let record = TradeRecord {
            id: Uuid::new_v4(),
            time: fill.time,
            instrument: self.instrument.clone(),
            strategy: self.strategy.clone(),
            units: fill.units,
            price: fill.price,
            pnl: fill.realized_pnl,
            cumulative_pnl: self.cumulative_pnl(),
        };
        report_trade(&record, plan.going());

        if let Err(e) = self.ledger.insert_trade(&record).await {
            error!("Failed to record trade {} in the ledger: {:#}", record.id, e);
        }
        if self.recent_limit > 0 {
            if self.recent.len() == self.recent_limit {
                self.recent.pop_front();
            }
            self.recent.push_back(record.clone());
        }
        Ok(record)
    }
}

fn report_trade(record: &TradeRecord, going: &str) {
    let rule = "-".repeat(100);
    info!("{}", rule);
    info!("{} | {}", record.time, going);
    info!(
        "{} | units = {} | price = {} | P&L = {} | Cum P&L = {}",
        record.time, record.units, record.price, record.pnl, record.cumulative_pnl
    );
    info!("{}", rule);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{MemoryLedger, OrderFill, PaperBroker};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;

    struct RejectingBroker;

    #[async_trait]
    impl Broker for RejectingBroker {
        async fn create_order(&self, _instrument: &str, _units: i64, _suppress: bool) -> Result<OrderFill> {
            Err(anyhow!("market closed"))
        }
    }

    struct BrokenLedger;

    #[async_trait]
    impl Ledger for BrokenLedger {
        async fn insert_trade(&self, _record: &TradeRecord) -> Result<()> {
            Err(anyhow!("database unavailable"))
        }
    }

    #[tokio::test]
    async fn test_rebalance_records_trades() {
        let broker = Arc::new(PaperBroker::new());
        let ledger = Arc::new(MemoryLedger::new());
        let mut executor = TradeExecutor::new(broker.clone(), ledger.clone(), "EUR_USD", "multi", 1_000);

        broker.mark(Utc::now(), 1.10);
        let record = executor.rebalance(Direction::Long).await.unwrap().unwrap();
        assert_eq!(record.units, 1_000);
        assert!(executor.rebalance(Direction::Long).await.unwrap().is_none());

        broker.mark(Utc::now(), 1.12);
        let record = executor.rebalance(Direction::Short).await.unwrap().unwrap();
        assert_eq!(record.units, -2_000);
        assert!((record.pnl - 20.0).abs() < 1e-9);
        assert!((record.cumulative_pnl - 20.0).abs() < 1e-9);
        assert_eq!(executor.position(), Direction::Short);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.records()[1].strategy, "multi");
    }

    #[tokio::test]
    async fn test_rejected_order_keeps_state() {
        let mut executor = TradeExecutor::new(
            Arc::new(RejectingBroker),
            Arc::new(MemoryLedger::new()),
            "EUR_USD",
            "multi",
            1_000,
        );
        let err = executor.rebalance(Direction::Long).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TradingError>(),
            Some(TradingError::OrderRejected { units: 1_000, .. })
        ));
        assert_eq!(executor.position(), Direction::Flat);
        assert!(executor.recent_trades().is_empty());
        assert_eq!(executor.trade_count(), 0);
        assert_eq!(executor.cumulative_pnl(), 0.0);
    }

    #[tokio::test]
    async fn test_ledger_failure_keeps_trade() {
        let broker = Arc::new(PaperBroker::new());
        broker.mark(Utc::now(), 1.10);
        let mut executor = TradeExecutor::new(broker, Arc::new(BrokenLedger), "EUR_USD", "multi", 1_000);
        let record = executor.rebalance(Direction::Short).await.unwrap();
        assert!(record.is_some());
        assert_eq!(executor.position(), Direction::Short);
        assert_eq!(executor.recent_trades().len(), 1);
    }

    #[tokio::test]
    async fn test_trade_window_is_bounded() {
        let broker = Arc::new(PaperBroker::new());
        let ledger = Arc::new(MemoryLedger::new());
        let mut executor =
            TradeExecutor::new(broker.clone(), ledger.clone(), "EUR_USD", "multi", 1_000).with_trade_window(3);

        for i in 0..10 {
            broker.mark(Utc::now(), 1.10 + 0.001 * i as f64);
            let target = if i % 2 == 0 { Direction::Long } else { Direction::Short };
            executor.rebalance(target).await.unwrap().unwrap();
        }
        assert_eq!(executor.trade_count(), 10);
        assert_eq!(ledger.len(), 10);
        assert_eq!(executor.recent_trades().len(), 3);
        let ids: Vec<Uuid> = executor.recent_trades().iter().map(|t| t.id).collect();
        let tail: Vec<Uuid> = ledger.records()[7..].iter().map(|t| t.id).collect();
        assert_eq!(ids, tail);
        let total: f64 = ledger.records().iter().map(|t| t.pnl).sum();
        assert!((executor.cumulative_pnl() - total).abs() < 1e-9);
    }
}
