//! Trade ledger backed by the `trade_records` table

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use multitrader_rs::execution::{Ledger, TradeRecord};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait};
use shared::entity::trade_records;
use shared::get_db_connection;
use tracing::{debug, info};

pub struct SeaOrmLedger {
    db: DatabaseConnection,
}

impl SeaOrmLedger {
    /// Connect and bring the schema up to date
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = get_db_connection(database_url).await?;
        Migrator::up(&db, None).await?;
        info!("Trade ledger ready");
        Ok(Self { db })
    }
}

#[async_trait]
impl Ledger for SeaOrmLedger {
    async fn insert_trade(&self, record: &TradeRecord) -> Result<()> {
        let row = to_active_model(record)?;
        let inserted = trade_records::Entity::insert(row)
            .on_conflict(
                // a no-op update on the key, so a replayed id is skipped
                OnConflict::column(trade_records::Column::TradeId)
                    .update_column(trade_records::Column::TradeId)
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        if inserted == 0 {
            debug!("Trade {} already recorded", record.id);
        }
        Ok(())
    }
}

fn decimal(value: f64, field: &str) -> Result<Decimal> {
    Decimal::try_from(value)
        .map(|d| d.round_dp(8))
        .map_err(|_| anyhow!("{} {} is not representable as a decimal", field, value))
}

fn to_active_model(record: &TradeRecord) -> Result<trade_records::ActiveModel> {
    Ok(trade_records::ActiveModel {
        trade_id: ActiveValue::Set(record.id.to_string()),
        time: ActiveValue::Set(record.time),
        instrument: ActiveValue::Set(record.instrument.clone()),
        strategy: ActiveValue::Set(record.strategy.clone()),
        units: ActiveValue::Set(record.units),
        price: ActiveValue::Set(decimal(record.price, "price")?),
        pnl: ActiveValue::Set(decimal(record.pnl, "pnl")?),
        cum_pnl: ActiveValue::Set(decimal(record.cumulative_pnl, "cumulative pnl")?),
        created_at: ActiveValue::Set(Some(Utc::now())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use uuid::Uuid;

    #[test]
    fn test_active_model_from_record() {
        let record = TradeRecord {
            id: Uuid::new_v4(),
            time: Utc::now(),
            instrument: "EUR_USD".to_string(),
            strategy: "sma_contrarian".to_string(),
            units: -200_000,
            price: 1.100_123_456_789,
            pnl: 12.5,
            cumulative_pnl: -3.25,
        };
        let row = to_active_model(&record).unwrap();
        assert_eq!(row.trade_id, ActiveValue::Set(record.id.to_string()));
        assert_eq!(row.units, ActiveValue::Set(-200_000));
        assert_eq!(row.price, ActiveValue::Set(Decimal::from_str("1.10012346").unwrap()));
        assert_eq!(row.cum_pnl, ActiveValue::Set(Decimal::from_str("-3.25").unwrap()));
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        assert!(decimal(f64::NAN, "price").is_err());
        assert!(decimal(f64::INFINITY, "pnl").is_err());
    }
}
