//! MultiTrader-RS: a live multi-strategy bar trading engine
//!
//! One tick stream drives the whole pipeline, one bar close at a time:
//!
//! - **Data**: tick buffering, fixed-length bar aggregation and backfill bootstrap
//! - **Features**: rolling statistics and lagged feature vectors over bar history
//! - **Strategy**: independent signal producers and the signal combiner
//! - **Portfolio**: the position state machine
//! - **Execution**: broker/ledger collaborators and trade reporting
//! - **Engine**: the trading session that owns the mutable state
//!
//! # Example
//!
//! ```no_run
//! use multitrader_rs::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run(config: SessionConfig, market: Arc<dyn MarketData>, broker: Arc<dyn Broker>) -> Result<()> {
//! let registry = ProducerRegistry::new();
//! let mut session = TradingSession::new(&config, &registry, broker, Arc::new(MemoryLedger::new()))?;
//! session.bootstrap(market.as_ref(), &SystemClock).await?;
//! let ticks = market.stream_ticks(&config.instrument).await?;
//! let summary = session.run(ticks, std::future::pending::<()>()).await?;
//! println!("cumulative P&L: {}", summary.cumulative_pnl);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod execution;
pub mod features;
pub mod indicators;
pub mod portfolio;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::config::*;
    pub use crate::data::*;
    pub use crate::engine::*;
    pub use crate::error::TradingError;
    pub use crate::execution::*;
    pub use crate::features::*;
    pub use crate::portfolio::*;
    pub use crate::strategy::*;

    pub use anyhow::{Context, Result};
}

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
