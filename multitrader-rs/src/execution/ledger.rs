//! Trade records and the ledger collaborator

use crate::Result;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// One executed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub instrument: String,
    /// Strategy label of the session
    pub strategy: String,
    /// Signed units traded
    pub units: i64,
    pub price: f64,
    /// Realized P&L of this fill
    pub pnl: f64,
    /// Session P&L including this fill
    pub cumulative_pnl: f64,
}

/// Downstream trade store; inserts are idempotent on the record id
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn insert_trade(&self, record: &TradeRecord) -> Result<()>;
}

/// In-memory ledger
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<TradeRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TradeRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn insert_trade(&self, record: &TradeRecord) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| anyhow!("memory ledger poisoned"))?;
        if !records.iter().any(|r| r.id == record.id) {
            records.push(record.clone());
        }
        Ok(())
    }
}
