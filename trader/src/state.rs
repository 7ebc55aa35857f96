use crate::services::{ledger_service::SeaOrmLedger, oanda::OandaClient};
use anyhow::{anyhow, Context};
use multitrader_rs::prelude::*;
use shared::Config;
use std::sync::Arc;

/// Collaborators and settings of one trader process
pub struct AppState {
    pub session: SessionConfig,
    pub registry: ProducerRegistry,
    pub market: Arc<dyn MarketData>,
    pub broker: Arc<dyn Broker>,
    pub ledger: Arc<dyn Ledger>,
}

impl AppState {
    pub async fn new() -> Result<Self, anyhow::Error> {
        let config = Config::from_env()?;

        let session = SessionConfig::from_file(&config.trader_config)
            .with_context(|| format!("failed to load session config `{}`", config.trader_config))?;
        tracing::info!("Loaded session config from {}", config.trader_config);

        let mut registry = ProducerRegistry::new();
        registry.load_models(&session.models)?;

        let (account_id, api_key) = config
            .oanda_credentials()
            .ok_or_else(|| anyhow!("OANDA_ACCOUNT_ID and OANDA_API_KEY must be set"))?;
        let oanda = Arc::new(OandaClient::new(
            &config.oanda_api_url,
            &config.oanda_stream_url,
            account_id,
            api_key,
        )?);

        let broker: Arc<dyn Broker> = if config.paper_trading {
            tracing::info!("Paper trading: orders fill at the live mid price");
            Arc::new(PaperBroker::new())
        } else {
            oanda.clone()
        };

        let ledger: Arc<dyn Ledger> = if config.ledger_enabled {
            Arc::new(SeaOrmLedger::connect(&config.database_url).await?)
        } else {
            tracing::info!("Database ledger disabled, trades are kept in memory");
            Arc::new(MemoryLedger::new())
        };

        Ok(AppState {
            session,
            registry,
            market: oanda,
            broker,
            ledger,
        })
    }
}
