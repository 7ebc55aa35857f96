use anyhow::Result;
use multitrader_rs::prelude::{SystemClock, TradingSession};
use tracing_subscriber::EnvFilter;

mod services;
mod state;

use state::AppState;

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(
        "Starting multitrader {} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIME")
    );

    let app_state = AppState::new().await?;
    tracing::info!("AppState initialized");

    let mut session = TradingSession::new(
        &app_state.session,
        &app_state.registry,
        app_state.broker.clone(),
        app_state.ledger.clone(),
    )?;
    session
        .bootstrap(app_state.market.as_ref(), &SystemClock)
        .await?;
    tracing::info!("Seeded {} bars of history", session.history().len());

    let ticks = app_state
        .market
        .stream_ticks(&app_state.session.instrument)
        .await?;
    tracing::info!("Trader is running, press Ctrl-C to stop");

    let summary = session.run(ticks, ctrl_c()).await?;
    tracing::info!(
        "Stopped after {} ticks and {} trades, final position {}, cumulative P&L {:.2}",
        summary.ticks_seen,
        summary.trade_count,
        summary.position,
        summary.cumulative_pnl
    );

    Ok(())
}
